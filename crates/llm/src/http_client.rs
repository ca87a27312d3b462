//! HTTP Client Factory
//!
//! Builds reqwest clients with the configured timeout policy. A call that
//! exceeds the request timeout fails with `LlmError::NetworkError`.

use std::time::Duration;

use crate::types::{LlmError, LlmResult, ProviderConfig};

/// Build a `reqwest::Client` with connect and whole-request timeouts.
pub fn build_http_client(config: &ProviderConfig) -> LlmResult<reqwest::Client> {
    build_client(
        Duration::from_secs(config.connect_timeout_secs),
        Some(Duration::from_secs(config.request_timeout_secs)),
    )
}

/// Build a `reqwest::Client` with a connect timeout and, when given, a
/// whole-request timeout. Callers that bound requests themselves pass `None`.
pub fn build_client(
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
) -> LlmResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);
    if let Some(limit) = request_timeout {
        builder = builder.timeout(limit);
    }
    builder.build().map_err(|e| LlmError::ProviderUnavailable {
        message: format!("failed to build HTTP client: {}", e),
    })
}
