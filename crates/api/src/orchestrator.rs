//! Runs one task's job against the backend on behalf of a request.
//!
//! The job runs on its own tokio task. The handler holds a drop guard on the
//! job's cancellation token, so a client that disconnects mid-poll stops
//! the polling loop instead of leaving it running to the end of its budget.
//! The backend itself is not told; the job may still finish there.

use std::sync::Arc;
use std::time::Instant;

use studio_comfyui::extract::extractor_for;
use studio_comfyui::job::{run_job, CompletedJob};
use studio_core::task::TaskKind;
use studio_core::template::JobDescription;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Submit `job` for `task` and wait for its artifacts.
pub async fn execute(state: &AppState, task: TaskKind, job: JobDescription) -> AppResult<CompletedJob> {
    let backend = Arc::clone(&state.backend);
    let policy = state.config.retry_policy(task);
    let extractor = extractor_for(task.artifact_kind(), &state.config.comfyui_dir);

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let started = Instant::now();
    let span = tracing::info_span!("job", task = %task);
    let handle = tokio::spawn(
        async move { run_job(backend.as_ref(), &job, extractor.as_ref(), &policy, &cancel).await }
            .instrument(span),
    );

    let completed = handle
        .await
        .map_err(|e| AppError::InternalError(format!("Job task for {task} failed: {e}")))??;

    tracing::info!(
        task = %task,
        prompt_id = %completed.handle,
        artifacts = completed.artifacts.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Job completed",
    );
    Ok(completed)
}
