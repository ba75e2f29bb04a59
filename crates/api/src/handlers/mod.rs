//! Per-task request handlers.
//!
//! Every handler follows the same shape: validate the form, instantiate the
//! task's template, inject fields, then hand the job to [`generate`].
//! Validation always happens before anything is staged or submitted.

pub mod audio;
pub mod image;
pub mod text;

use axum::response::Response;
use studio_core::task::TaskKind;
use studio_core::template::JobDescription;

use crate::emitter;
use crate::error::AppResult;
use crate::form::UploadedFile;
use crate::orchestrator;
use crate::state::AppState;
use crate::upload::stage_upload;

/// Run `job` for `task` and emit its artifacts.
async fn generate(state: &AppState, task: TaskKind, job: JobDescription) -> AppResult<Response> {
    let completed = orchestrator::execute(state, task, job).await?;
    emitter::emit(task.artifact_kind(), &completed).await
}

/// Stage `file` and return the value `task`'s template expects for it.
async fn stage_for(state: &AppState, task: TaskKind, file: &UploadedFile) -> AppResult<String> {
    let staged = stage_upload(&state.config.input_dir(), file).await?;
    Ok(staged.reference(task.upload_reference()))
}
