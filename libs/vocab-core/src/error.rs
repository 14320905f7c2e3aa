//! Error types for vocab-core.

use thiserror::Error;

/// Result type alias using PlanError.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors that can occur while planning a session or building a quiz.
///
/// Nothing in the engine is process-fatal; these signal insufficiency the
/// caller can surface to the user. Malformed persisted state is repaired by
/// clamping, never reported through here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("vocabulary is empty")]
    EmptyVocabulary,

    #[error("no eligible words for a session of {requested}")]
    ExhaustedVocabulary { requested: usize },
}
