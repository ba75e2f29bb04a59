//! Submit-then-poll for a single job.

use studio_core::artifact::ArtifactSet;
use studio_core::job::JobHandle;
use studio_core::retry::RetryPolicy;
use studio_core::template::JobDescription;
use tokio_util::sync::CancellationToken;

use crate::api::ComfyUIApiError;
use crate::backend::GenerationBackend;
use crate::extract::ArtifactExtractor;
use crate::poller::{poll_until_ready, PollError};

/// Failure of a submit-then-poll run.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The backend refused or could not be reached at submission time.
    #[error("Job submission failed: {0}")]
    Submission(#[source] ComfyUIApiError),

    #[error(transparent)]
    Poll(#[from] PollError),
}

/// A finished job: its backend handle and the artifacts it produced.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub handle: JobHandle,
    pub artifacts: ArtifactSet,
}

/// Submit `job` once, then poll for its artifacts.
///
/// Submission is never retried; polling follows `policy`.
pub async fn run_job(
    backend: &dyn GenerationBackend,
    job: &JobDescription,
    extractor: &dyn ArtifactExtractor,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<CompletedJob, JobError> {
    let handle = backend.submit(job).await.map_err(|e| {
        tracing::error!(endpoint = backend.endpoint(), error = %e, "Job submission failed");
        JobError::Submission(e)
    })?;

    tracing::info!(
        prompt_id = %handle,
        kind = ?extractor.kind(),
        max_attempts = policy.max_attempts,
        "Job submitted, polling for result",
    );

    let artifacts = poll_until_ready(backend, &handle, extractor, policy, cancel).await?;
    Ok(CompletedJob { handle, artifacts })
}
