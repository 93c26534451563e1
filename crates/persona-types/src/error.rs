use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in persona-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to the persona text and its backing store.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("persona source not found: {0}")]
    NotFound(String),

    #[error("filesystem error: {0}")]
    FileSystemError(String),

    #[error("invalid persona content: {0}")]
    InvalidContent(String),
}

/// Errors raised while assembling startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Engine-facing error kinds.
///
/// Component-local failures (history reads, cache, summaries) degrade inside
/// the engine and never reach this type; what does reach it is surfaced to the
/// caller as-is.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A required secret or file is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The store could not complete an operation the caller asked for directly.
    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    /// The LLM call failed, timed out, or returned something unusable.
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    /// The request was malformed and was rejected before any side effect.
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for ChatError {
    fn from(e: ConfigError) -> Self {
        ChatError::Configuration(e.to_string())
    }
}

impl From<PersonaError> for ChatError {
    fn from(e: PersonaError) -> Self {
        match e {
            PersonaError::InvalidContent(msg) => ChatError::Validation(msg),
            other => ChatError::Configuration(other.to_string()),
        }
    }
}
