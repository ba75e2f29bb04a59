use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use studio_comfyui::job::JobError;
use studio_comfyui::poller::PollError;
use studio_core::error::CoreError;
use studio_core::job::JobHandle;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`JobError`] for backend job
/// failures, and adds HTTP-specific variants. Implements [`IntoResponse`]
/// to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `studio_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Submission or polling of a backend job failed.
    #[error(transparent)]
    Job(#[from] JobError),

    /// Reading an artifact or staging an upload failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The job finished but left nothing to return.
    #[error("No artifact produced")]
    NoArtifact { handle: Option<JobHandle> },

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            context: context.into(),
            source,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut supported_styles = None;
        let mut prompt_id = None;

        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::UnsupportedOption { allowed, .. } => {
                    supported_styles = Some(allowed.clone());
                    (StatusCode::BAD_REQUEST, "UNSUPPORTED_OPTION", core.to_string())
                }
                CoreError::Template { .. } | CoreError::Internal(_) => {
                    tracing::error!(error = %core, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Backend job errors ---
            AppError::Job(JobError::Submission(err)) => {
                tracing::error!(error = %err, "Job submission failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SUBMISSION_FAILED",
                    "The generation backend did not accept the job".to_string(),
                )
            }
            AppError::Job(JobError::Poll(poll)) => {
                prompt_id = Some(poll.handle().to_string());
                let code = match poll {
                    PollError::Timeout { .. } => "POLL_TIMEOUT",
                    PollError::JobFailed { .. } => "JOB_FAILED",
                    PollError::Cancelled { .. } => "CANCELLED",
                };
                tracing::warn!(error = %poll, "Job did not complete");
                (StatusCode::INTERNAL_SERVER_ERROR, code, poll.to_string())
            }

            // --- HTTP-specific errors ---
            AppError::Io { context, source } => {
                tracing::error!(context = %context, error = %source, "I/O error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "IO_ERROR",
                    context.clone(),
                )
            }
            AppError::NoArtifact { handle } => {
                prompt_id = handle.as_ref().map(ToString::to_string);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "NO_ARTIFACT",
                    "no artifact produced".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(styles) = supported_styles {
            body["supportedStyles"] = json!(styles);
        }
        if let Some(id) = prompt_id {
            body["prompt_id"] = json!(id);
        }

        (status, axum::Json(body)).into_response()
    }
}
