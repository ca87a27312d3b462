//! OpenAI-Compatible SSE Adapter
//!
//! Handles chat-completion chunk events. Models that deliver reasoning in a
//! separate `reasoning_content` field (DeepSeek R1, QwQ and similar) have it
//! re-wrapped in `<think>`/`</think>` so downstream consumers see one tagged
//! text stream regardless of provider.

use agent_m_core::{THINK_CLOSE, THINK_OPEN};
use serde::Deserialize;

use crate::types::{LlmError, LlmResult, UsageStats};

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

/// Event extracted from one SSE line
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEvent {
    /// Text fragment (may contain think tags)
    Text(String),
    /// Token usage, usually on the final chunk
    Usage(UsageStats),
    /// A choice finished
    Finished(String),
    /// `[DONE]` sentinel
    Done,
}

/// Adapter for OpenAI-compatible SSE chunks
#[derive(Debug, Default)]
pub struct OpenAIAdapter {
    /// Inside an out-of-band reasoning block
    in_reasoning: bool,
}

impl OpenAIAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close an open reasoning block, if any.
    fn close_reasoning(&mut self, events: &mut Vec<ChunkEvent>) {
        if self.in_reasoning {
            self.in_reasoning = false;
            events.push(ChunkEvent::Text(THINK_CLOSE.to_string()));
        }
    }

    /// Adapt one SSE line into zero or more chunk events.
    pub fn adapt(&mut self, line: &str) -> LlmResult<Vec<ChunkEvent>> {
        let trimmed = line.trim();
        let Some(data) = trimmed.strip_prefix("data:") else {
            // Comments, `event:` and `id:` lines carry nothing we need
            return Ok(vec![]);
        };
        let data = data.trim();

        let mut events = Vec::new();
        if data.is_empty() {
            return Ok(events);
        }
        if data == "[DONE]" {
            self.close_reasoning(&mut events);
            events.push(ChunkEvent::Done);
            return Ok(events);
        }

        let payload: ChunkPayload =
            serde_json::from_str(data).map_err(|e| LlmError::ParseError {
                message: format!("invalid stream chunk: {}", e),
            })?;

        for choice in payload.choices {
            if let Some(delta) = choice.delta {
                if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
                    if !self.in_reasoning {
                        self.in_reasoning = true;
                        events.push(ChunkEvent::Text(THINK_OPEN.to_string()));
                    }
                    events.push(ChunkEvent::Text(reasoning));
                }
                if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                    self.close_reasoning(&mut events);
                    events.push(ChunkEvent::Text(content));
                }
            }
            if let Some(reason) = choice.finish_reason {
                self.close_reasoning(&mut events);
                events.push(ChunkEvent::Finished(reason));
            }
        }

        if let Some(usage) = payload.usage {
            let mut stats = UsageStats::new(usage.prompt_tokens, usage.completion_tokens);
            if let Some(total) = usage.total_tokens {
                stats.total_tokens = total;
            }
            events.push(ChunkEvent::Usage(stats));
        }

        Ok(events)
    }
}
