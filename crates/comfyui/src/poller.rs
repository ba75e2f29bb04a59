//! Poll-until-ready loop bridging a synchronous request to the backend's
//! asynchronous job queue.
//!
//! Each attempt waits [`RetryPolicy::interval`], queries the job's history
//! and runs the task's [`ArtifactExtractor`] over it. Failed queries and
//! empty extractions both just use up an attempt. The loop ends on the
//! first non-empty artifact set, a backend-reported execution failure,
//! cancellation, or when the attempt budget is spent.

use serde_json::Value;
use studio_core::artifact::ArtifactSet;
use studio_core::job::JobHandle;
use studio_core::retry::RetryPolicy;
use tokio_util::sync::CancellationToken;

use crate::backend::GenerationBackend;
use crate::extract::ArtifactExtractor;

/// Log a "still waiting" line every this many pending attempts.
const PROGRESS_LOG_EVERY: u32 = 10;

/// Outcome of interpreting one status payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Nothing usable yet; keep polling.
    Pending,
    Ready(ArtifactSet),
    /// The backend reports the execution failed.
    Failed(String),
}

/// Why polling ended without artifacts.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("No result for job {handle} after {attempts} attempts")]
    Timeout { handle: JobHandle, attempts: u32 },

    #[error("Job {handle} failed on the backend: {reason}")]
    JobFailed { handle: JobHandle, reason: String },

    #[error("Polling for job {handle} was cancelled")]
    Cancelled { handle: JobHandle },
}

impl PollError {
    pub fn handle(&self) -> &JobHandle {
        match self {
            PollError::Timeout { handle, .. }
            | PollError::JobFailed { handle, .. }
            | PollError::Cancelled { handle } => handle,
        }
    }
}

/// Interpret a history payload for `handle`.
///
/// Artifacts win over an error status: if anything was produced it is
/// returned.
pub fn classify(payload: &Value, handle: &JobHandle, extractor: &dyn ArtifactExtractor) -> JobStatus {
    let artifacts = extractor.extract(payload);
    if !artifacts.is_empty() {
        return JobStatus::Ready(artifacts);
    }
    match execution_error(payload, handle) {
        Some(reason) => JobStatus::Failed(reason),
        None => JobStatus::Pending,
    }
}

/// The failure reason when the job's history entry has `status_str: "error"`.
fn execution_error(payload: &Value, handle: &JobHandle) -> Option<String> {
    let status = payload.get(handle.as_str())?.get("status")?;
    if status.get("status_str").and_then(Value::as_str) != Some("error") {
        return None;
    }

    // Messages are `[name, data]` pairs; prefer the exception text.
    let reason = status
        .get("messages")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .filter(|pair| pair.first().and_then(Value::as_str) == Some("execution_error"))
        .find_map(|pair| pair.get(1)?.get("exception_message")?.as_str())
        .unwrap_or("execution failed")
        .trim()
        .to_string();
    Some(reason)
}

/// Poll `backend` for `handle` until `extractor` finds artifacts.
///
/// Makes at most `policy.max_attempts` status queries, each preceded by a
/// `policy.interval` wait. Query errors are logged and absorbed.
/// Cancelling `cancel` stops the loop at the next wait or in-flight query.
pub async fn poll_until_ready(
    backend: &dyn GenerationBackend,
    handle: &JobHandle,
    extractor: &dyn ArtifactExtractor,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<ArtifactSet, PollError> {
    for attempt in 1..=policy.max_attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(handle, attempt)),
            _ = tokio::time::sleep(policy.interval) => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(handle, attempt)),
            result = backend.history(handle) => result,
        };

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(
                    prompt_id = %handle,
                    attempt,
                    error = %e,
                    "Status query failed, retrying",
                );
                continue;
            }
        };

        match classify(&payload, handle, extractor) {
            JobStatus::Ready(artifacts) => {
                tracing::info!(
                    prompt_id = %handle,
                    attempt,
                    artifacts = artifacts.len(),
                    "Job result ready",
                );
                return Ok(artifacts);
            }
            JobStatus::Failed(reason) => {
                tracing::warn!(prompt_id = %handle, attempt, reason = %reason, "Job failed on backend");
                return Err(PollError::JobFailed {
                    handle: handle.clone(),
                    reason,
                });
            }
            JobStatus::Pending => {
                if payload.get(handle.as_str()).is_some() {
                    tracing::debug!(
                        prompt_id = %handle,
                        attempt,
                        kind = ?extractor.kind(),
                        "Job entry present but no artifacts extracted",
                    );
                } else if attempt % PROGRESS_LOG_EVERY == 0 {
                    tracing::debug!(
                        prompt_id = %handle,
                        attempt,
                        max_attempts = policy.max_attempts,
                        "Still waiting for job result",
                    );
                }
            }
        }
    }

    tracing::warn!(
        prompt_id = %handle,
        attempts = policy.max_attempts,
        "Gave up waiting for job result",
    );
    Err(PollError::Timeout {
        handle: handle.clone(),
        attempts: policy.max_attempts,
    })
}

fn cancelled(handle: &JobHandle, attempt: u32) -> PollError {
    // The backend keeps running the job; there is no abort call.
    tracing::info!(prompt_id = %handle, attempt, "Polling cancelled");
    PollError::Cancelled {
        handle: handle.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::json;
    use studio_core::artifact::Artifact;
    use studio_core::template::JobDescription;

    use super::*;
    use crate::api::ComfyUIApiError;
    use crate::extract::{ImageExtractor, TextExtractor};

    /// Backend replaying scripted history responses; `Pending` once exhausted.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<Value, ComfyUIApiError>>>,
        queries: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<Value, ComfyUIApiError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                queries: AtomicU32::new(0),
            }
        }

        fn queries(&self) -> u32 {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn submit(&self, _job: &JobDescription) -> Result<JobHandle, ComfyUIApiError> {
            Ok(JobHandle::new("job-1"))
        }

        async fn history(&self, _handle: &JobHandle) -> Result<Value, ComfyUIApiError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({})))
        }

        fn endpoint(&self) -> &str {
            "scripted"
        }
    }

    fn not_found() -> Result<Value, ComfyUIApiError> {
        Err(ComfyUIApiError::ApiError {
            status: 404,
            body: "not found".into(),
        })
    }

    fn image_payload(name: &str) -> Result<Value, ComfyUIApiError> {
        Ok(json!({
            "job-1": { "outputs": { "9": { "images": [{ "filename": name, "type": "output" }] } } }
        }))
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(1000), max_attempts)
    }

    #[tokio::test(start_paused = true)]
    async fn all_pending_makes_exactly_max_attempts_queries() {
        let backend = ScriptedBackend::new(vec![]);
        let handle = JobHandle::new("job-1");

        let result = poll_until_ready(
            &backend,
            &handle,
            &ImageExtractor::new("/srv"),
            &policy(7),
            &CancellationToken::new(),
        )
        .await;

        assert_matches!(result, Err(PollError::Timeout { attempts: 7, ref handle }) if handle.as_str() == "job-1");
        assert_eq!(backend.queries(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_then_success() {
        let backend = ScriptedBackend::new(vec![
            not_found(),
            not_found(),
            not_found(),
            image_payload("a.png"),
        ]);
        let handle = JobHandle::new("job-1");

        let artifacts = poll_until_ready(
            &backend,
            &handle,
            &ImageExtractor::new("/srv"),
            &policy(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(backend.queries(), 4);
        assert_eq!(
            artifacts.first(),
            Some(&Artifact::ImagePath("/srv/output/a.png".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pending_does_not_stop_the_loop() {
        let backend = ScriptedBackend::new(vec![
            Ok(json!({})),
            Ok(json!({ "job-1": { "outputs": {} } })),
            Ok(json!({ "job-1": { "outputs": { "4": { "text": "done" } } } })),
        ]);
        let handle = JobHandle::new("job-1");

        let artifacts = poll_until_ready(
            &backend,
            &handle,
            &TextExtractor,
            &policy(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(artifacts.text(), "done");
        assert_eq!(backend.queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_error_status_fails_fast() {
        let backend = ScriptedBackend::new(vec![Ok(json!({
            "job-1": {
                "outputs": {},
                "status": {
                    "status_str": "error",
                    "completed": false,
                    "messages": [
                        ["execution_start", { "prompt_id": "job-1" }],
                        ["execution_error", { "exception_message": "CUDA out of memory\n" }]
                    ]
                }
            }
        }))]);
        let handle = JobHandle::new("job-1");

        let result = poll_until_ready(
            &backend,
            &handle,
            &ImageExtractor::new("/srv"),
            &policy(30),
            &CancellationToken::new(),
        )
        .await;

        assert_matches!(result, Err(PollError::JobFailed { ref reason, .. }) if reason == "CUDA out of memory");
        assert_eq!(backend.queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_query() {
        let backend = ScriptedBackend::new(vec![]);
        let handle = JobHandle::new("job-1");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = poll_until_ready(
            &backend,
            &handle,
            &ImageExtractor::new("/srv"),
            &policy(30),
            &cancel,
        )
        .await;

        assert_matches!(result, Err(PollError::Cancelled { .. }));
        assert_eq!(backend.queries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_loop_stops_queries() {
        let backend = ScriptedBackend::new(vec![]);
        let handle = JobHandle::new("job-1");
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            canceller.cancel();
        });

        let result = poll_until_ready(
            &backend,
            &handle,
            &ImageExtractor::new("/srv"),
            &policy(30),
            &cancel,
        )
        .await;

        assert_matches!(result, Err(PollError::Cancelled { .. }));
        assert_eq!(backend.queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reasoning_only_reply_keeps_polling() {
        let backend = ScriptedBackend::new(vec![
            Ok(json!({ "job-1": { "outputs": { "4": { "text": "<think>planning</think>" } } } })),
            Ok(json!({ "job-1": { "outputs": { "4": { "text": "<think>planning</think>final answer" } } } })),
        ]);
        let handle = JobHandle::new("job-1");

        let artifacts = poll_until_ready(
            &backend,
            &handle,
            &TextExtractor,
            &policy(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(artifacts.text(), "final answer");
        assert_eq!(backend.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_job_entry_counts_as_pending() {
        let backend = ScriptedBackend::new(vec![
            Ok(json!({ "job-1": { "outputs": { "9": { "images": "a.png" } } } })),
            image_payload("a.png"),
        ]);
        let handle = JobHandle::new("job-1");

        let artifacts = poll_until_ready(
            &backend,
            &handle,
            &ImageExtractor::new("/srv"),
            &policy(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(backend.queries(), 2);
    }

    #[test]
    fn classify_prefers_artifacts_over_error_status() {
        let payload = json!({
            "job-1": {
                "outputs": { "9": { "images": [{ "filename": "partial.png" }] } },
                "status": { "status_str": "error" }
            }
        });
        let status = classify(&payload, &JobHandle::new("job-1"), &ImageExtractor::new("/srv"));
        assert_matches!(status, JobStatus::Ready(_));
    }

    #[test]
    fn classify_error_without_messages() {
        let payload = json!({ "job-1": { "outputs": {}, "status": { "status_str": "error" } } });
        let status = classify(&payload, &JobHandle::new("job-1"), &TextExtractor);
        assert_eq!(status, JobStatus::Failed("execution failed".into()));
    }

    #[test]
    fn classify_success_status_without_outputs_is_pending() {
        let payload = json!({ "job-1": { "outputs": {}, "status": { "status_str": "success" } } });
        let status = classify(&payload, &JobHandle::new("job-1"), &TextExtractor);
        assert_eq!(status, JobStatus::Pending);
    }
}
