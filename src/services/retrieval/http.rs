//! HTTP Retrieval Agent
//!
//! Talks to a retrieval service that accepts `{"instruction": "..."}` and
//! answers `{"output": "...", "metadata": {...}}`.
//!
//! The client shares the provider's connect timeout. The whole-call limit is
//! applied by `RetrievalRunner` from `pipeline.retrieval_timeout_secs`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use agent_m_core::{CoreError, CoreResult, RetrievalAgent, RetrievalResult};
use agent_m_llm::{build_client, ProviderConfig};

use crate::models::settings::RetrievalConfig;
use crate::utils::error::{AppError, AppResult};

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    instruction: &'a str,
}

/// Retrieval agent reached over HTTP.
pub struct HttpRetrievalAgent {
    endpoint: url::Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpRetrievalAgent {
    pub fn new(config: &RetrievalConfig, transport: &ProviderConfig) -> AppResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| AppError::config("retrieval.endpoint is not configured"))?;
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| AppError::config(format!("retrieval.endpoint: {}", e)))?;
        let client = build_client(Duration::from_secs(transport.connect_timeout_secs), None)
            .map_err(|e| AppError::internal(e.to_string()))?;

        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait]
impl RetrievalAgent for HttpRetrievalAgent {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn execute(&self, instruction: &str) -> CoreResult<RetrievalResult> {
        debug!(endpoint = %self.endpoint, "sending retrieval instruction");

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&ExecuteRequest { instruction });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::retrieval(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::retrieval(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "retrieval service returned an error status");
            return Ok(RetrievalResult::failure(format!(
                "retrieval service returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let result: RetrievalResult = serde_json::from_str(&body)?;
        Ok(result)
    }
}
