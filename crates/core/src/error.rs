//! Error types for grounded.
//!
//! A single error enum covers every failure category in the pipeline:
//! configuration, I/O, input validation, unreachable services, embedding,
//! vector index, generation, prompt rendering and serialization.

use thiserror::Error;

/// Unified error type for grounded.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors are represented and propagated to the caller.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input rejected at a boundary before any downstream call
    #[error("Validation error: {0}")]
    Validation(String),

    /// An external service (embedding model, vector database, generative
    /// model, corpus host) was unreachable or timed out.
    #[error("Service unavailable ({service}): {message}")]
    ServiceUnavailable { service: String, message: String },

    /// Embedding backend errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index errors
    #[error("Index error: {0}")]
    Index(String),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Shorthand for a [`AppError::ServiceUnavailable`].
    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ServiceUnavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Classify a reqwest error.
    ///
    /// Timeouts and connection failures become `ServiceUnavailable`;
    /// anything else is wrapped by `fallback`.
    pub fn from_request_error(
        service: &str,
        err: reqwest::Error,
        fallback: fn(String) -> AppError,
    ) -> Self {
        if err.is_timeout() || err.is_connect() {
            AppError::unavailable(service, err.to_string())
        } else {
            fallback(format!("{} request failed: {}", service, err))
        }
    }

    /// Whether a caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ServiceUnavailable { .. })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
