//! Report Agent
//!
//! Multi-section report generation: plan the sections, retrieve each one
//! once, then compile the sections into a report document.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use agent_m_core::{RetrievalAgent, StreamEvent};
use agent_m_llm::{GenerateConfig, LlmProvider, Message, UsageStats};

use super::render::{attach_query, fallback_report, SectionResult};
use crate::models::result::AgentResult;
use crate::models::settings::PipelineConfig;
use crate::services::coordinator::{EMPTY_QUERY_CODE, EMPTY_QUERY_MESSAGE};
use crate::services::planner::{PlanBuilder, RetrievalPlan, EMPTY_INSTRUCTION};
use crate::services::prompts::{render, PromptResolver, REPORT_COMPILE_SYSTEM, REPORT_COMPILE_USER};
use crate::services::retrieval::{parse_table, RetrievalRunner};
use crate::services::streaming::GenerationRelay;
use crate::utils::error::{AppError, AppResult};
use crate::utils::text::parse_json_object;

/// Output when no plan could be built.
pub const PLAN_FAILED_MESSAGE: &str = "Failed to create report plan.";
pub const PLAN_FAILED_CODE: &str = "plan";

const COMPILE_TEMPERATURE: f32 = 0.2;

/// Progress reporting for streamed runs.
struct Progress<'a> {
    tx: Option<&'a mpsc::Sender<StreamEvent>>,
}

impl Progress<'_> {
    async fn send(&self, event: StreamEvent) -> AppResult<()> {
        match self.tx {
            Some(tx) => tx
                .send(event)
                .await
                .map_err(|_| AppError::cancelled("report stream receiver dropped")),
            None => Ok(()),
        }
    }

    async fn note(&self, text: impl Into<String>) -> AppResult<()> {
        self.send(StreamEvent::thinking(text)).await
    }
}

pub struct ReportAgent {
    planner: PlanBuilder,
    retrieval: RetrievalRunner,
    relay: GenerationRelay,
    prompts: Arc<dyn PromptResolver>,
    max_rows: usize,
}

impl ReportAgent {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retrieval: Arc<dyn RetrievalAgent>,
        prompts: Arc<dyn PromptResolver>,
        options: &PipelineConfig,
    ) -> Self {
        let relay = GenerationRelay::new(llm, options.stream_buffer);
        let timeout = options.retrieval_timeout_secs.map(Duration::from_secs);
        Self {
            planner: PlanBuilder::new(relay.clone(), prompts.clone(), options.max_sections),
            retrieval: RetrievalRunner::new(retrieval, timeout, options.stream_buffer),
            relay,
            prompts,
            max_rows: options.max_rows,
        }
    }

    /// Build a report for `question` and return it as a JSON payload.
    pub async fn execute(&self, question: &str) -> AppResult<AgentResult> {
        let span = info_span!("report", request_id = %Uuid::new_v4(), mode = "whole");
        self.run(question, &Progress { tx: None }).instrument(span).await
    }

    /// Build a report, streaming progress as thinking events.
    ///
    /// Errors for blank input or a failed plan are sent as content. A built
    /// report is sent as an internal `Result` event. The stream ends with `Done`.
    pub async fn execute_stream(&self, question: &str, tx: mpsc::Sender<StreamEvent>) -> AppResult<()> {
        let span = info_span!("report", request_id = %Uuid::new_v4(), mode = "stream");
        async move {
            let progress = Progress { tx: Some(&tx) };
            let outcome = match self.run(question, &progress).await {
                Ok(result) if result.is_error() => progress.send(StreamEvent::content(result.output)).await,
                Ok(result) => progress.send(StreamEvent::Result(result.into())).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => {
                    // Receiver may already be gone; nothing left to do then.
                    let _ = tx.send(StreamEvent::Done).await;
                    Ok(())
                }
                Err(e) if e.is_cancelled() => {
                    info!(reason = %e, "report stream abandoned by consumer");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, question: &str, progress: &Progress<'_>) -> AppResult<AgentResult> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(AgentResult::error(EMPTY_QUERY_MESSAGE, EMPTY_QUERY_CODE));
        }

        progress.note("Menyusun rencana laporan...\n").await?;
        let planned = match self.planner.build(question, None).await {
            Ok(planned) => planned,
            Err(e) => {
                warn!(error = %e, "report plan unavailable");
                return Ok(AgentResult::error(PLAN_FAILED_MESSAGE, PLAN_FAILED_CODE));
            }
        };
        let plan = planned.plan;
        let mut total = planned.usage;

        let mut sections = Vec::with_capacity(plan.sections.len());
        for section in &plan.sections {
            progress.note(format!("Mengambil data: {}\n", section.title)).await?;
            sections.push(self.retrieve_section(&section.title, &section.instruction).await);
        }

        progress.note("Menyusun dokumen laporan...\n").await?;
        let (payload, compile_usage) = self.compile(question, &plan, &sections).await?;
        total.accumulate(&compile_usage);
        let payload = attach_query(payload, question);

        info!(sections = sections.len(), "report compiled");
        Ok(AgentResult::new(serde_json::to_string(&payload)?)
            .with("plan", plan.to_value())
            .with("sections", serde_json::to_value(&sections)?)
            .with("plan_usage", json!(planned.usage))
            .with("compile_usage", json!(compile_usage))
            .with("total_usage", json!(total)))
    }

    /// Retrieve one section once. Failures are recorded on the section.
    async fn retrieve_section(&self, title: &str, instruction: &str) -> SectionResult {
        if instruction.is_empty() {
            return SectionResult::failed(title, "", EMPTY_INSTRUCTION);
        }

        let retrieved = self.retrieval.execute(instruction).await;
        if retrieved.is_failure() {
            return SectionResult::failed(title, instruction, retrieved.output);
        }

        let table = parse_table(&retrieved.output);
        let row_count = table.rows.len();
        let mut rows = table.rows;
        rows.truncate(self.max_rows);

        SectionResult {
            title: title.to_string(),
            instruction: instruction.to_string(),
            columns: table.columns,
            rows,
            row_count,
            error: None,
        }
    }

    /// Ask the model to assemble the report; fall back to local rendering.
    async fn compile(
        &self,
        question: &str,
        plan: &RetrievalPlan,
        sections: &[SectionResult],
    ) -> AppResult<(Value, UsageStats)> {
        let plan_json = serde_json::to_string(plan)?;
        let sections_json = serde_json::to_string(sections)?;
        let messages = vec![
            Message::system(self.prompts.resolve(REPORT_COMPILE_SYSTEM)?),
            Message::user(render(
                &self.prompts.resolve(REPORT_COMPILE_USER)?,
                &[
                    ("question", question),
                    ("plan", plan_json.as_str()),
                    ("sections", sections_json.as_str()),
                ],
            )),
        ];

        let generated = self
            .relay
            .whole(messages, GenerateConfig::with_temperature(COMPILE_TEMPERATURE))
            .await?;

        let payload = match parse_json_object(&generated.content) {
            Some(map) if map.contains_key("report") => Value::Object(map),
            _ => {
                warn!("report compile output unusable, rendering locally");
                fallback_report(plan, sections, self.max_rows)
            }
        };
        Ok((payload, generated.usage))
    }
}
