//! The seam between request orchestration and the generation backend.
//!
//! Handlers only see [`GenerationBackend`]; production wires in
//! [`ComfyUIApi`], tests wire in scripted fakes.

use async_trait::async_trait;
use studio_core::job::JobHandle;
use studio_core::template::JobDescription;

use crate::api::{ComfyUIApi, ComfyUIApiError};

/// Job submission and status lookup against a generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Queue a job. One outbound call, never retried.
    async fn submit(&self, job: &JobDescription) -> Result<JobHandle, ComfyUIApiError>;

    /// Fetch the raw status payload for a job.
    async fn history(&self, handle: &JobHandle) -> Result<serde_json::Value, ComfyUIApiError>;

    /// Base URL, for health reporting and logs.
    fn endpoint(&self) -> &str;

    /// Liveness probe. Backends without one report healthy.
    async fn ping(&self) -> Result<(), ComfyUIApiError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for ComfyUIApi {
    async fn submit(&self, job: &JobDescription) -> Result<JobHandle, ComfyUIApiError> {
        self.submit_workflow(job.as_value()).await
    }

    async fn history(&self, handle: &JobHandle) -> Result<serde_json::Value, ComfyUIApiError> {
        self.get_history(handle.as_str()).await
    }

    fn endpoint(&self) -> &str {
        self.api_url()
    }

    async fn ping(&self) -> Result<(), ComfyUIApiError> {
        self.system_stats().await.map(|_| ())
    }
}

/// Pick the first configured instance that answers its stats probe.
///
/// Falls back to the first URL when none responds, so a backend that is
/// still warming up at startup does not prevent the server from booting.
/// Returns `None` only when `urls` is empty.
pub async fn select_endpoint(client: &reqwest::Client, urls: &[String]) -> Option<ComfyUIApi> {
    for url in urls {
        let api = ComfyUIApi::with_client(client.clone(), url.clone());
        match api.system_stats().await {
            Ok(_) => {
                tracing::info!(url = %url, "ComfyUI instance reachable");
                return Some(api);
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "ComfyUI instance not reachable");
            }
        }
    }

    let first = urls.first()?;
    tracing::warn!(url = %first, "No ComfyUI instance answered; defaulting to the first");
    Some(ComfyUIApi::with_client(client.clone(), first.clone()))
}
