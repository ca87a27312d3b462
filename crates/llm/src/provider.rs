//! LLM Provider Trait
//!
//! Defines the text-generation capability consumed by the pipeline.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{GenerateConfig, LlmError, LlmResponse, LlmResult, Message};

/// Trait that all text-generation providers must implement.
///
/// Provides a unified interface for:
/// - Whole completions (send_message)
/// - Streaming completions (stream_message)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Send role-tagged messages and get a complete response.
    async fn send_message(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
    ) -> LlmResult<LlmResponse>;

    /// Stream a response as raw text fragments via a channel.
    ///
    /// Fragments are sent in generation order with arbitrary boundaries.
    /// Reasoning delivered out of band by the provider is wrapped in
    /// `<think>`/`</think>` so consumers see a single tagged text stream.
    /// When the receiver is dropped the provider stops reading and returns
    /// what it has accumulated so far.
    ///
    /// # Returns
    /// Final complete response after streaming
    async fn stream_message(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
        tx: mpsc::Sender<String>,
    ) -> LlmResult<LlmResponse>;
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
