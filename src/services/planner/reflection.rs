//! Reflection Loop
//!
//! After a failed retrieval, asks for one corrected instruction using the
//! observed error. The caller retries at most once; there is no loop.

use std::sync::Arc;

use tracing::{info, warn};

use agent_m_core::RetrievalResult;
use agent_m_llm::{GenerateConfig, Message, UsageStats};

use super::instruction::clean_instruction;
use crate::services::prompts::{render, PromptResolver, DB_REFLECTION_SYSTEM, DB_REFLECTION_USER};
use crate::services::streaming::{EventSink, Forward, GenerationRelay};
use crate::utils::error::AppResult;

/// Placeholder used when no plan summary exists.
pub const NO_PLAN: &str = "-";

/// Everything the reflection request needs.
#[derive(Debug, Clone, Copy)]
pub struct ReflectionInput<'a> {
    pub question: &'a str,
    pub plan_summary: Option<&'a str>,
    pub failed_instruction: &'a str,
    pub error: &'a str,
}

/// Result of one reflection call.
#[derive(Debug, Clone)]
pub struct Reflection {
    /// Corrected instruction, only when non-empty and different from the failed one
    pub instruction: Option<String>,
    pub usage: UsageStats,
}

/// Whether a retrieval result should trigger reflection.
pub fn needs_reflection(result: &RetrievalResult) -> bool {
    result.is_failure()
}

pub struct ReflectionLoop {
    relay: GenerationRelay,
    prompts: Arc<dyn PromptResolver>,
}

impl ReflectionLoop {
    pub fn new(relay: GenerationRelay, prompts: Arc<dyn PromptResolver>) -> Self {
        Self { relay, prompts }
    }

    fn build_messages(&self, input: &ReflectionInput<'_>) -> AppResult<Vec<Message>> {
        let plan = input
            .plan_summary
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_PLAN);
        Ok(vec![
            Message::system(self.prompts.resolve(DB_REFLECTION_SYSTEM)?),
            Message::user(render(
                &self.prompts.resolve(DB_REFLECTION_USER)?,
                &[
                    ("question", input.question),
                    ("plan", plan),
                    ("instruction", input.failed_instruction),
                    ("error", input.error),
                ],
            )),
        ])
    }

    /// Ask for one corrected instruction.
    pub async fn reflect(
        &self,
        input: ReflectionInput<'_>,
        sink: Option<&mut EventSink>,
    ) -> AppResult<Reflection> {
        let messages = self.build_messages(&input)?;
        let generated = self
            .relay
            .run(messages, GenerateConfig::deterministic(), sink, Forward::ThinkingOnly)
            .await?;

        let candidate = clean_instruction(&generated.content);
        let instruction = if candidate.is_empty() || candidate == input.failed_instruction.trim() {
            warn!("reflection produced no new instruction");
            None
        } else {
            info!(instruction = %candidate, "reflection produced a corrected instruction");
            Some(candidate)
        };

        Ok(Reflection {
            instruction,
            usage: generated.usage,
        })
    }
}
