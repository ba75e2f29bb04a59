//! Request body extractor shared by every task route.
//!
//! Task routes accept the same fields either as a multipart form (the only
//! way to send files), a JSON object or a urlencoded form. [`TaskForm`]
//! normalizes all three into text fields plus uploaded files.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Form, FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde_json::Value;
use studio_core::error::CoreError;
use studio_core::options::is_switched_on;

use crate::error::{AppError, AppResult};

/// A file part of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name, if any.
    pub file_name: Option<String>,
    pub data: Bytes,
}

/// Text fields and files of a task request.
#[derive(Debug, Default)]
pub struct TaskForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl TaskForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: UploadedFile) -> Self {
        self.files.insert(name.into(), file);
        self
    }

    /// A text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn require_text(&self, name: &str) -> AppResult<&str> {
        self.text(name)
            .ok_or_else(|| missing(name))
    }

    /// An uploaded file, `None` when absent or empty.
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).filter(|f| !f.data.is_empty())
    }

    pub fn require_file(&self, name: &str) -> AppResult<&UploadedFile> {
        self.file(name).ok_or_else(|| missing(name))
    }

    /// Whether a boolean-ish field is switched on. Absent means off.
    pub fn flag(&self, name: &str) -> bool {
        self.text(name).is_some_and(is_switched_on)
    }

    async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name.is_empty() {
                continue;
            }
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name: Some(file_name),
                            data,
                        },
                    );
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    fn from_json(body: Value) -> AppResult<Self> {
        let Value::Object(map) = body else {
            return Err(AppError::BadRequest("JSON body must be an object".into()));
        };

        let mut form = Self::new();
        for (name, value) in map {
            let text = match value {
                Value::String(s) => s,
                Value::Null => continue,
                Value::Bool(_) | Value::Number(_) => value.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(AppError::BadRequest(format!(
                        "Field '{name}' must be a string"
                    )));
                }
            };
            form.fields.insert(name, text);
        }
        Ok(form)
    }
}

fn missing(name: &str) -> AppError {
    AppError::Core(CoreError::Validation(format!(
        "Missing required field '{name}'"
    )))
}

impl<S> FromRequest<S> for TaskForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Self::from_json(body)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self {
                fields,
                files: HashMap::new(),
            })
        } else {
            Err(AppError::BadRequest(format!(
                "Unsupported content type '{content_type}'; use multipart/form-data or application/json"
            )))
        }
    }
}
