//! Execution Coordinator
//!
//! Top-level state machine for one request:
//!
//! ```text
//! ROUTING -> CONVERSATIONAL
//!         -> PLANNING -> INSTRUCTING -> EXECUTING -> [REFLECTING -> RE-EXECUTING] -> SYNTHESIZING
//! ```
//!
//! Whole mode and streaming mode share one implementation; streaming mode
//! passes an `EventSink` down to every stage. A closed sink is checked at each
//! stage boundary and ends the request without further calls.

mod data_path;
mod stage;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use agent_m_core::{RetrievalAgent, WireEvent};
use agent_m_llm::{GenerateConfig, LlmProvider, Message};

use crate::models::result::AgentResult;
use crate::models::settings::PipelineConfig;
use crate::services::planner::{
    InstructionCompiler, PlanBuilder, ReflectionLoop, RouteTarget, Routed, RoutingResolver,
};
use crate::services::prompts::{
    render, PromptResolver, GENERAL_SYSTEM, SYNTHESIS_SYSTEM, SYNTHESIS_USER,
};
use crate::services::retrieval::RetrievalRunner;
use crate::services::streaming::{EventSink, Forward, Generated, GenerationRelay};
use crate::utils::error::{AppError, AppResult};

pub use stage::PipelineStage;

/// Output for blank input.
pub const EMPTY_QUERY_MESSAGE: &str = "Empty query.";
/// `metadata.error` for blank input.
pub const EMPTY_QUERY_CODE: &str = "empty query";

/// Runs requests through routing, retrieval and synthesis.
pub struct Coordinator {
    router: RoutingResolver,
    planner: PlanBuilder,
    compiler: InstructionCompiler,
    reflection: ReflectionLoop,
    retrieval: RetrievalRunner,
    relay: GenerationRelay,
    prompts: Arc<dyn PromptResolver>,
    options: PipelineConfig,
}

impl Coordinator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retrieval: Arc<dyn RetrievalAgent>,
        prompts: Arc<dyn PromptResolver>,
        options: PipelineConfig,
    ) -> Self {
        let relay = GenerationRelay::new(llm, options.stream_buffer);
        let timeout = options.retrieval_timeout_secs.map(Duration::from_secs);

        Self {
            router: RoutingResolver::new(relay.clone(), prompts.clone()),
            planner: PlanBuilder::new(relay.clone(), prompts.clone(), options.max_sections),
            compiler: InstructionCompiler::new(relay.clone(), prompts.clone()),
            reflection: ReflectionLoop::new(relay.clone(), prompts.clone()),
            retrieval: RetrievalRunner::new(retrieval, timeout, options.stream_buffer),
            relay,
            prompts,
            options,
        }
    }

    /// Answer one request and return the composed result.
    ///
    /// `history` is only used on the conversational path.
    pub async fn execute(&self, input: &str, history: &[Message]) -> AppResult<AgentResult> {
        let span = info_span!("pipeline", request_id = %Uuid::new_v4(), mode = "whole");
        self.run(input, history, None).instrument(span).await
    }

    /// Answer one request as a stream of wire events ending with `done`.
    ///
    /// Dropping the receiver cancels the request at the next stage boundary.
    /// Transport failures from the text-generation provider are returned as
    /// errors and no `done` event is sent.
    pub async fn execute_stream(
        &self,
        input: &str,
        history: &[Message],
        tx: mpsc::Sender<WireEvent>,
    ) -> AppResult<()> {
        let span = info_span!("pipeline", request_id = %Uuid::new_v4(), mode = "stream");
        async move {
            let mut sink = EventSink::new(tx);
            match self.run(input, history, Some(&mut sink)).await {
                Ok(_) => {
                    sink.done().await;
                    Ok(())
                }
                Err(e) if e.is_cancelled() => {
                    info!(reason = %e, "stream abandoned by consumer");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        input: &str,
        history: &[Message],
        mut sink: Option<&mut EventSink>,
    ) -> AppResult<AgentResult> {
        let question = input.trim();
        if question.is_empty() {
            let result = AgentResult::error(EMPTY_QUERY_MESSAGE, EMPTY_QUERY_CODE);
            if let Some(sink) = sink.as_deref_mut() {
                sink.content(result.output.clone()).await;
            }
            return Ok(result);
        }

        let routed = self.router.resolve(question, sink.as_deref_mut()).await?;
        if let Some(sink) = sink.as_deref_mut() {
            sink.thinking(routed.decision.announcement()).await;
        }
        ensure_open(&sink, PipelineStage::Routing)?;

        match routed.decision.target {
            RouteTarget::Conversational => self.converse(question, history, routed, sink).await,
            RouteTarget::DataRetrieval => self.retrieve(question, routed, sink).await,
        }
    }

    async fn converse(
        &self,
        question: &str,
        history: &[Message],
        routed: Routed,
        sink: Option<&mut EventSink>,
    ) -> AppResult<AgentResult> {
        debug!(stage = %PipelineStage::Conversational, "entering stage");
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.prompts.resolve(GENERAL_SYSTEM)?));
        messages.extend_from_slice(history);
        messages.push(Message::user(question));

        let generated = self
            .relay
            .run(messages, GenerateConfig::default(), sink, Forward::All)
            .await?;

        let mut total = routed.usage;
        total.accumulate(&generated.usage);

        Ok(AgentResult::new(generated.content.trim())
            .with("agent", json!(RouteTarget::Conversational.as_str()))
            .with("routing_reasoning", json!(routed.decision.reasoning))
            .with("routing_usage", json!(routed.usage))
            .with("usage", json!(generated.usage))
            .with("total_usage", json!(total)))
    }

    /// Synthesis call over the question and whatever retrieval output is in hand.
    async fn synthesize(
        &self,
        question: &str,
        results: &str,
        sink: Option<&mut EventSink>,
    ) -> AppResult<Generated> {
        let messages = vec![
            Message::system(self.prompts.resolve(SYNTHESIS_SYSTEM)?),
            Message::user(render(
                &self.prompts.resolve(SYNTHESIS_USER)?,
                &[("question", question), ("results", results)],
            )),
        ];
        Ok(self
            .relay
            .run(messages, GenerateConfig::default(), sink, Forward::All)
            .await?)
    }
}

/// Fail with `Cancelled` when the streaming consumer has gone away.
fn ensure_open(sink: &Option<&mut EventSink>, stage: PipelineStage) -> AppResult<()> {
    match sink {
        Some(sink) if sink.is_closed() => Err(AppError::cancelled(format!(
            "consumer gone after {}",
            stage
        ))),
        _ => Ok(()),
    }
}
