use crate::task::TaskKind;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An enumerated request option outside its allow-list.
    #[error("Unsupported {option}: {value}")]
    UnsupportedOption {
        option: &'static str,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Template for {task} is invalid: {message}")]
    Template { task: TaskKind, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
