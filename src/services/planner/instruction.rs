//! Instruction Compiler
//!
//! Turns a routed request, optionally with a plan summary, into the single
//! free-text imperative instruction handed to the retrieval agent.

use std::sync::Arc;

use tracing::{debug, warn};

use agent_m_llm::{GenerateConfig, Message, UsageStats};

use crate::services::prompts::{render, PromptResolver, DB_COMMAND_SYSTEM, DB_COMMAND_USER};
use crate::services::streaming::{EventSink, Forward, GenerationRelay};
use crate::utils::error::AppResult;
use crate::utils::text::{strip_code_fence, strip_reasoning};

/// Remove reasoning tags and a wrapping fence, then trim.
pub fn clean_instruction(raw: &str) -> String {
    strip_code_fence(&strip_reasoning(raw))
}

/// Request text with the plan summary appended when present.
pub fn compose_intent(routed_input: &str, plan_summary: Option<&str>) -> String {
    match plan_summary.map(str::trim).filter(|s| !s.is_empty()) {
        Some(summary) => format!("{}\n\nRencana:\n{}", routed_input, summary),
        None => routed_input.to_string(),
    }
}

/// Compiled instruction plus the usage of the compile call.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub instruction: String,
    pub usage: UsageStats,
}

pub struct InstructionCompiler {
    relay: GenerationRelay,
    prompts: Arc<dyn PromptResolver>,
}

impl InstructionCompiler {
    pub fn new(relay: GenerationRelay, prompts: Arc<dyn PromptResolver>) -> Self {
        Self { relay, prompts }
    }

    fn build_messages(&self, intent: &str) -> AppResult<Vec<Message>> {
        Ok(vec![
            Message::system(self.prompts.resolve(DB_COMMAND_SYSTEM)?),
            Message::user(render(
                &self.prompts.resolve(DB_COMMAND_USER)?,
                &[("message", intent)],
            )),
        ])
    }

    /// Compile one instruction. An empty model answer falls back to `routed_input`.
    pub async fn compile(
        &self,
        routed_input: &str,
        plan_summary: Option<&str>,
        sink: Option<&mut EventSink>,
    ) -> AppResult<Compiled> {
        let messages = self.build_messages(&compose_intent(routed_input, plan_summary))?;
        let generated = self
            .relay
            .run(messages, GenerateConfig::deterministic(), sink, Forward::ThinkingOnly)
            .await?;

        let mut instruction = clean_instruction(&generated.content);
        if instruction.is_empty() {
            warn!("instruction compiler returned nothing, using routed input");
            instruction = routed_input.to_string();
        }
        debug!(%instruction, "instruction compiled");

        Ok(Compiled {
            instruction,
            usage: generated.usage,
        })
    }
}
