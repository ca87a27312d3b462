//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use agent_m_core::CoreError;
use agent_m_llm::LlmError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Errors from the core crate (retrieval, stream plumbing)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Text-generation transport/provider errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// The consumer abandoned the output stream
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled(_))
    }
}

/// Failure of the plan-building stage.
///
/// The coordinator degrades on both variants; report mode turns them into an
/// explicit error result.
#[derive(Error, Debug)]
pub enum PlanError {
    /// The plan payload was missing, malformed, or had no sections
    #[error("plan unavailable: {0}")]
    Unavailable(String),

    /// Transport failure while asking for the plan
    #[error("plan request failed: {0}")]
    Llm(#[from] LlmError),
}

impl PlanError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<AppError> for PlanError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Llm(e) => PlanError::Llm(e),
            other => PlanError::Unavailable(other.to_string()),
        }
    }
}
