//! Staging of uploaded files into the backend's input directory.

use std::path::{Path, PathBuf};

use studio_core::task::UploadReference;

use crate::error::{AppError, AppResult};
use crate::form::UploadedFile;

/// An upload written to disk where the backend can load it.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    /// Absolute path of the staged file.
    pub path: PathBuf,
    /// File name inside the input directory.
    pub name: String,
}

impl StagedUpload {
    /// The value a template expects for this upload.
    pub fn reference(&self, how: UploadReference) -> String {
        match how {
            UploadReference::AbsolutePath => self.path.to_string_lossy().into_owned(),
            UploadReference::FileName => self.name.clone(),
        }
    }
}

/// Keep only the final path component and drop anything that could
/// escape the input directory.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim_start_matches('.')
        .to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Write `file` to `{input_dir}/{uuid}_{sanitized name}`.
///
/// The uuid prefix keeps concurrent uploads of the same name apart.
pub async fn stage_upload(input_dir: &Path, file: &UploadedFile) -> AppResult<StagedUpload> {
    tokio::fs::create_dir_all(input_dir)
        .await
        .map_err(|e| AppError::io("Failed to prepare upload directory", e))?;

    let original = file.file_name.as_deref().unwrap_or("upload");
    let name = format!("{}_{}", uuid::Uuid::new_v4(), sanitize_file_name(original));
    let path = input_dir.join(&name);

    tokio::fs::write(&path, &file.data)
        .await
        .map_err(|e| AppError::io("Failed to stage upload", e))?;

    tracing::debug!(path = %path.display(), bytes = file.data.len(), "Staged upload");
    Ok(StagedUpload { path, name })
}
