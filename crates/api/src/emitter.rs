//! Turns a job's artifacts into the HTTP response body.

use std::path::Path;

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use studio_comfyui::job::CompletedJob;
use studio_core::artifact::{Artifact, ArtifactKind};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};

/// Content type for an artifact file, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "flac" => "audio/flac",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Write the result of a `kind` task onto the response.
///
/// Files stream the first file artifact; text joins every blob and is sent
/// as is, whitespace included. An empty result is an error.
pub async fn emit(kind: ArtifactKind, job: &CompletedJob) -> AppResult<Response> {
    match kind {
        ArtifactKind::Text => emit_text(job),
        ArtifactKind::Image | ArtifactKind::Audio => emit_file(kind, job).await,
    }
}

fn emit_text(job: &CompletedJob) -> AppResult<Response> {
    let text = job.artifacts.text();
    if text.is_empty() {
        return Err(AppError::NoArtifact {
            handle: Some(job.handle.clone()),
        });
    }
    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}

async fn emit_file(kind: ArtifactKind, job: &CompletedJob) -> AppResult<Response> {
    let path = job
        .artifacts
        .first_file()
        .and_then(Artifact::path)
        .ok_or_else(|| AppError::NoArtifact {
            handle: Some(job.handle.clone()),
        })?;

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| AppError::io(format!("Failed to open artifact {}", path.display()), e))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| AppError::io(format!("Failed to stat artifact {}", path.display()), e))?
        .len();

    tracing::debug!(path = %path.display(), bytes = len, "Streaming artifact");

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type_for(path)));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));

    if kind == ArtifactKind::Audio {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().replace('"', ""))
            .unwrap_or_else(|| "audio".into());
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")) {
            headers.insert(CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}
