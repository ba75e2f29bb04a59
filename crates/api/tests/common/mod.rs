//! Shared helpers for the API integration tests.
//!
//! Tests drive the real router (same middleware as production) against a
//! [`MockBackend`] and a temporary ComfyUI directory.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Map, Value};
use studio_api::config::{LogFormat, ServerConfig};
use studio_api::router::build_app_router;
use studio_api::state::AppState;
use studio_comfyui::api::ComfyUIApiError;
use studio_comfyui::backend::GenerationBackend;
use studio_core::job::JobHandle;
use studio_core::session::SessionStore;
use studio_core::task::TaskKind;
use studio_core::template::{JobDescription, TemplateRegistry, WorkflowTemplate};
use tower::ServiceExt;

pub const MOCK_ENDPOINT: &str = "mock://comfyui";

/// Attempts every task gets in tests; keeps timeouts fast.
pub const TEST_MAX_ATTEMPTS: u32 = 3;

/// What the mock backend's history endpoint reports.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// History carries these `outputs` for the job.
    Outputs(Value),
    /// History stays empty forever.
    Pending,
    /// Execution failed on the backend with this message.
    ExecutionError(String),
    /// Submission is refused with a 500.
    RejectSubmit,
}

/// Scripted stand-in for a ComfyUI instance.
pub struct MockBackend {
    behaviour: Behaviour,
    healthy: bool,
    submissions: Mutex<Vec<Value>>,
    history_calls: AtomicU32,
}

impl MockBackend {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            healthy: true,
            submissions: Mutex::new(Vec::new()),
            history_calls: AtomicU32::new(0),
        })
    }

    pub fn unhealthy() -> Arc<Self> {
        Arc::new(Self {
            behaviour: Behaviour::Pending,
            healthy: false,
            submissions: Mutex::new(Vec::new()),
            history_calls: AtomicU32::new(0),
        })
    }

    /// Job graphs submitted so far, in order.
    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn last_submission(&self) -> Value {
        self.submissions().pop().expect("no job was submitted")
    }

    pub fn history_calls(&self) -> u32 {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn submit(&self, job: &JobDescription) -> Result<JobHandle, ComfyUIApiError> {
        if matches!(self.behaviour, Behaviour::RejectSubmit) {
            return Err(ComfyUIApiError::ApiError {
                status: 500,
                body: "queue unavailable".into(),
            });
        }
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(job.as_value().clone());
        Ok(JobHandle::new(format!("prompt-{}", submissions.len())))
    }

    async fn history(&self, handle: &JobHandle) -> Result<Value, ComfyUIApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let entry = match &self.behaviour {
            Behaviour::Outputs(outputs) => json!({ "outputs": outputs }),
            Behaviour::ExecutionError(message) => json!({
                "outputs": {},
                "status": {
                    "status_str": "error",
                    "messages": [["execution_error", { "exception_message": message }]]
                }
            }),
            Behaviour::Pending | Behaviour::RejectSubmit => return Ok(json!({})),
        };
        Ok(json!({ handle.as_str(): entry }))
    }

    fn endpoint(&self) -> &str {
        MOCK_ENDPOINT
    }

    async fn ping(&self) -> Result<(), ComfyUIApiError> {
        if self.healthy {
            Ok(())
        } else {
            Err(ComfyUIApiError::Malformed("system stats unavailable".into()))
        }
    }
}

/// A minimal graph for `task`: one node per injection point, each input
/// holding a recognizable default.
pub fn template_graph(task: TaskKind) -> Value {
    let mut nodes = Map::new();
    for binding in task.bindings() {
        let node = nodes
            .entry(binding.point.node)
            .or_insert_with(|| json!({ "class_type": "Test", "inputs": {} }));
        node["inputs"][binding.point.input] = json!(format!("default-{}", binding.point.input));
    }
    Value::Object(nodes)
}

pub fn test_templates() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    for task in TaskKind::ALL {
        registry.insert(WorkflowTemplate::parse(task, template_graph(task)).unwrap());
    }
    registry
}

/// Build a test `ServerConfig` with safe defaults and a fast poll loop.
pub fn test_config(comfyui_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        comfyui_urls: vec![MOCK_ENDPOINT.to_string()],
        comfyui_dir: comfyui_dir.to_path_buf(),
        workflow_dir: comfyui_dir.join("workflows"),
        upload_limit_bytes: 1024 * 1024,
        poll_interval: Duration::from_millis(1),
        max_attempts_overrides: TaskKind::ALL
            .iter()
            .map(|&task| (task, TEST_MAX_ATTEMPTS))
            .collect(),
        session_max_turns: 4,
        session_idle: Duration::from_secs(3600),
        log_format: LogFormat::Pretty,
    }
}

/// Build the full application router over `backend`, with the ComfyUI
/// directory rooted at `comfyui_dir`.
pub fn build_test_app(backend: Arc<MockBackend>, comfyui_dir: &Path) -> Router {
    build_test_app_with_config(backend, test_config(comfyui_dir))
}

/// Like [`build_test_app`], with a caller-tuned configuration.
pub fn build_test_app_with_config(backend: Arc<MockBackend>, config: ServerConfig) -> Router {
    let state = AppState {
        config: Arc::new(config.clone()),
        backend,
        templates: Arc::new(test_templates()),
        sessions: Arc::new(SessionStore::new(config.session_max_turns, config.session_idle)),
    };
    build_app_router(state, &config)
}

/// Write `bytes` to `{comfyui_dir}/output/{name}`.
pub fn write_output(comfyui_dir: &Path, name: &str, bytes: &[u8]) {
    let dir = comfyui_dir.join("output");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), bytes).unwrap();
}

/// History outputs with one image slot.
pub fn image_outputs(filename: &str) -> Value {
    json!({ "9": { "images": [{ "filename": filename, "type": "output" }] } })
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

const BOUNDARY: &str = "studio-test-boundary";

/// POST a multipart form with text `fields` and `(field, file name, bytes)` files.
pub async fn post_multipart(
    app: Router,
    uri: &str,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> Response<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
