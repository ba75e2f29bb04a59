//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, history retrieval and the system stats probe
//! using [`reqwest`].

use serde::Deserialize;
use studio_core::job::JobHandle;

/// HTTP client for a single ComfyUI instance.
#[derive(Debug, Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    /// Sent with every submission so the backend can attribute queue entries.
    client_id: String,
}

/// Response returned by the ComfyUI `/api/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: Option<String>,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body lacks a required field.
    #[error("Malformed ComfyUI response: {0}")]
    Malformed(String),
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling and shared timeouts).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            client_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// HTTP API base URL (e.g. `http://host:8188`).
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /api/prompt` with the workflow wrapped as `{ "prompt": ... }`.
    /// A success response without a `prompt_id` is reported as
    /// [`ComfyUIApiError::Malformed`].
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<JobHandle, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": self.client_id,
        });

        let response = self
            .client
            .post(format!("{}/api/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        match submitted.prompt_id {
            Some(id) if !id.is_empty() => {
                tracing::debug!(prompt_id = %id, queue_number = ?submitted.number, "Workflow queued");
                Ok(JobHandle::new(id))
            }
            _ => Err(ComfyUIApiError::Malformed(
                "submission response has no prompt_id".into(),
            )),
        }
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /api/history/{prompt_id}` request.  The returned JSON is
    /// keyed by prompt id and contains the per-node outputs once the job
    /// has run.
    pub async fn get_history(
        &self,
        prompt_id: &str,
    ) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/api/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Check that the instance answers `GET /api/system_stats`.
    pub async fn system_stats(&self) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/api/system_stats", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
