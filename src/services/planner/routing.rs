//! Routing Resolver
//!
//! Decides per request whether the data-retrieval path or the conversational
//! path answers it. Parsing is total: any unusable classifier output becomes
//! a conversational decision.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use agent_m_llm::{GenerateConfig, Message, UsageStats};

use crate::services::prompts::{render, PromptResolver, ROUTING_SYSTEM, ROUTING_USER};
use crate::services::streaming::{EventSink, Forward, GenerationRelay};
use crate::utils::error::AppResult;
use crate::utils::text::{parse_json_object, string_field};

/// Reasoning attached when the classifier output could not be parsed.
pub const PARSE_FALLBACK_REASONING: &str =
    "Failed to parse routing decision, defaulting to general.";

/// Downstream path for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    DataRetrieval,
    Conversational,
}

impl RouteTarget {
    /// Map a classifier label, tolerating common aliases.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "database" | "db" | "data" | "data_retrieval" | "sql" => Some(RouteTarget::DataRetrieval),
            "general" | "chat" | "conversational" => Some(RouteTarget::Conversational),
            _ => None,
        }
    }

    /// Label reported in result metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTarget::DataRetrieval => "database",
            RouteTarget::Conversational => "general",
        }
    }
}

impl std::fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub target: RouteTarget,
    pub reasoning: String,
    /// Never empty; falls back to the original request text
    pub routed_input: String,
}

impl RoutingDecision {
    /// Conversational decision used whenever the classifier output is unusable.
    pub fn fallback(original: &str, reasoning: impl Into<String>) -> Self {
        Self {
            target: RouteTarget::Conversational,
            reasoning: reasoning.into(),
            routed_input: original.to_string(),
        }
    }

    /// Parse classifier output. Never fails.
    pub fn parse(raw: &str, original: &str) -> Self {
        let Some(payload) = parse_json_object(raw) else {
            return Self::fallback(original, PARSE_FALLBACK_REASONING);
        };

        let reasoning = string_field(&payload, "reasoning").unwrap_or_default();
        let routed_input = string_field(&payload, "routed_input")
            .or_else(|| string_field(&payload, "rewritten_query"))
            .unwrap_or_else(|| original.to_string());

        let label = string_field(&payload, "agent");
        match label.as_deref().and_then(RouteTarget::parse) {
            Some(target) => Self {
                target,
                reasoning,
                routed_input,
            },
            None => Self {
                target: RouteTarget::Conversational,
                reasoning: format!(
                    "Unrecognized agent '{}', defaulting to general.",
                    label.unwrap_or_default()
                ),
                routed_input,
            },
        }
    }

    /// Thinking line announcing the decision in streaming mode.
    pub fn announcement(&self) -> String {
        format!(
            "Routing to: {}\nReasoning: {}\n\n",
            self.target, self.reasoning
        )
    }
}

/// Routing decision plus the usage of the classifier call.
#[derive(Debug, Clone)]
pub struct Routed {
    pub decision: RoutingDecision,
    pub usage: UsageStats,
}

/// Classifies requests with one deterministic text-generation call.
pub struct RoutingResolver {
    relay: GenerationRelay,
    prompts: Arc<dyn PromptResolver>,
}

impl RoutingResolver {
    pub fn new(relay: GenerationRelay, prompts: Arc<dyn PromptResolver>) -> Self {
        Self { relay, prompts }
    }

    pub fn build_messages(&self, message: &str) -> AppResult<Vec<Message>> {
        Ok(vec![
            Message::system(self.prompts.resolve(ROUTING_SYSTEM)?),
            Message::user(render(
                &self.prompts.resolve(ROUTING_USER)?,
                &[("message", message)],
            )),
        ])
    }

    /// Route `message`. Only transport failures surface as errors.
    ///
    /// With a sink, the classifier's reasoning is streamed as thinking; its
    /// JSON answer is never forwarded.
    pub async fn resolve(&self, message: &str, sink: Option<&mut EventSink>) -> AppResult<Routed> {
        let messages = self.build_messages(message)?;
        let generated = self
            .relay
            .run(messages, GenerateConfig::deterministic(), sink, Forward::ThinkingOnly)
            .await?;

        let decision = RoutingDecision::parse(&generated.content, message);
        if decision.reasoning == PARSE_FALLBACK_REASONING {
            warn!("routing output unparseable, using conversational path");
        }
        info!(target_path = %decision.target, "routing decided");

        Ok(Routed {
            decision,
            usage: generated.usage,
        })
    }
}
