//! Error handling for the trainer application.

use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dataset error: {0}")]
    Dataset(String),
}

/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, AppError>;
