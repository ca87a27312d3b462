//! Core Error Types
//!
//! Defines the foundational error types used across the Agent M workspace.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.
//!
//! The application crate extends these with additional variants for LLM
//! transport failures, configuration loading, prompt resolution, etc.

use thiserror::Error;

/// Core error type for the Agent M workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Retrieval agent transport or execution errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// A stream consumer went away before the producer finished
    #[error("Stream closed: {0}")]
    StreamClosed(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a retrieval error
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    /// Create a stream-closed error
    pub fn stream_closed(msg: impl Into<String>) -> Self {
        Self::StreamClosed(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
