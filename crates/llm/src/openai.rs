//! OpenAI-Compatible Provider
//!
//! Implementation of the LlmProvider trait for any chat-completions endpoint
//! speaking the OpenAI wire format (OpenAI, DeepSeek, vLLM, and similar).

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use agent_m_core::split_reasoning;

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    GenerateConfig, LlmError, LlmResponse, LlmResult, Message, ProviderConfig, StopReason,
    UsageStats,
};
use crate::http_client::build_http_client;
use crate::streaming_adapters::{ChunkEvent, OpenAIAdapter, SseLineBuffer};

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(&config)?;
        Ok(Self { config, client })
    }

    /// Chat-completions endpoint, derived from the base URL override if any
    fn endpoint(&self) -> String {
        match self.config.base_url.as_deref() {
            None => OPENAI_API_URL.to_string(),
            Some(base) => {
                let base = base.trim_end_matches('/');
                if base.ends_with(CHAT_COMPLETIONS_PATH) {
                    base.to_string()
                } else {
                    format!("{}{}", base, CHAT_COMPLETIONS_PATH)
                }
            }
        }
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        config: &GenerateConfig,
        stream: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": config.temperature.unwrap_or(self.config.temperature),
            "max_tokens": config.max_tokens.unwrap_or(self.config.max_tokens),
            "stream": stream,
        });

        if let Some(top_p) = config.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if let Some(stop) = config.stop.as_ref().filter(|s| !s.is_empty()) {
            body["stop"] = serde_json::json!(stop);
        }

        // Add stream options for usage in streaming
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        body
    }

    async fn post(&self, body: &serde_json::Value) -> LlmResult<reqwest::Response> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("openai"))?;

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;
            return Err(parse_http_error(status, &body_text, "openai"));
        }

        Ok(response)
    }

    /// Parse a whole (non-streaming) response
    fn parse_response(&self, response: &OpenAIResponse) -> LlmResponse {
        let choice = response.choices.first();

        let mut content = None;
        let mut thinking = None;
        if let Some(msg) = choice.and_then(|c| c.message.as_ref()) {
            content = msg.content.clone();
            thinking = msg.reasoning_content.clone().filter(|t| !t.is_empty());
        }

        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(|r| StopReason::from(r.as_str()))
            .unwrap_or(StopReason::EndTurn);

        let usage = response
            .usage
            .as_ref()
            .map(|u| {
                let mut stats = UsageStats::new(u.prompt_tokens, u.completion_tokens);
                if let Some(total) = u.total_tokens {
                    stats.total_tokens = total;
                }
                stats
            })
            .unwrap_or_default();

        LlmResponse {
            content,
            thinking,
            stop_reason,
            usage,
            model: response.model.clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
    ) -> LlmResult<LlmResponse> {
        let body = self.build_request_body(&messages, &config, false);
        let response = self.post(&body).await?;

        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;
        let parsed: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(&parsed))
    }

    async fn stream_message(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
        tx: mpsc::Sender<String>,
    ) -> LlmResult<LlmResponse> {
        let body = self.build_request_body(&messages, &config, true);
        let response = self.post(&body).await?;

        let mut adapter = OpenAIAdapter::new();
        let mut lines = SseLineBuffer::new();
        let mut raw_text = String::new();
        let mut usage = UsageStats::default();
        let mut stop_reason = StopReason::EndTurn;
        let mut receiver_gone = false;

        let mut stream = response.bytes_stream();

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

            for line in lines.push(&chunk) {
                let events = match adapter.adapt(&line) {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(error = %e, "openai: skipping malformed stream chunk");
                        continue;
                    }
                };
                for event in events {
                    match event {
                        ChunkEvent::Text(fragment) => {
                            raw_text.push_str(&fragment);
                            if tx.send(fragment).await.is_err() {
                                debug!("openai: fragment receiver dropped, stopping stream");
                                receiver_gone = true;
                                break 'read;
                            }
                        }
                        ChunkEvent::Usage(stats) => usage = stats,
                        ChunkEvent::Finished(reason) => {
                            stop_reason = StopReason::from(reason.as_str());
                        }
                        ChunkEvent::Done => break 'read,
                    }
                }
            }
        }

        if !receiver_gone {
            if let Some(line) = lines.finish() {
                for event in adapter.adapt(&line).unwrap_or_default() {
                    if let ChunkEvent::Text(fragment) = event {
                        raw_text.push_str(&fragment);
                        let _ = tx.send(fragment).await;
                    }
                }
            }
        }

        let (thinking, content) = split_reasoning(&raw_text);
        Ok(LlmResponse {
            content: Some(content),
            thinking: if thinking.is_empty() {
                None
            } else {
                Some(thinking)
            },
            stop_reason,
            usage,
            model: self.config.model.clone(),
        })
    }
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}
