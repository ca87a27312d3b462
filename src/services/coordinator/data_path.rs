//! Data-retrieval branch of the coordinator.

use serde_json::json;
use tracing::{debug, info, warn};

use agent_m_llm::UsageStats;

use super::{ensure_open, Coordinator, PipelineStage};
use crate::models::result::AgentResult;
use crate::services::planner::{needs_reflection, ReflectionInput, RetrievalPlan, RouteTarget, Routed};
use crate::services::streaming::EventSink;
use crate::utils::error::AppResult;

impl Coordinator {
    /// PLANNING -> INSTRUCTING -> EXECUTING -> [REFLECTING -> RE-EXECUTING] -> SYNTHESIZING
    pub(super) async fn retrieve(
        &self,
        question: &str,
        routed: Routed,
        mut sink: Option<&mut EventSink>,
    ) -> AppResult<AgentResult> {
        let decision = routed.decision;
        let mut total: UsageStats = routed.usage;
        let mut result = AgentResult::default()
            .with("agent", json!(RouteTarget::DataRetrieval.as_str()))
            .with("routing_reasoning", json!(decision.reasoning))
            .with("routing_usage", json!(routed.usage));

        let mut plan: Option<RetrievalPlan> = None;
        if self.options.planning_enabled {
            enter(&mut sink, PipelineStage::Planning).await;
            match self
                .planner
                .build(&decision.routed_input, sink.as_deref_mut())
                .await
            {
                Ok(planned) => {
                    total.accumulate(&planned.usage);
                    result.insert("plan", planned.plan.to_value());
                    result.insert("plan_usage", json!(planned.usage));
                    plan = Some(planned.plan);
                }
                Err(e) => warn!(error = %e, "planning failed, continuing without a plan"),
            }
            ensure_open(&sink, PipelineStage::Planning)?;
        }
        let plan_summary = plan.as_ref().map(RetrievalPlan::summary);

        enter(&mut sink, PipelineStage::Instructing).await;
        let compiled = self
            .compiler
            .compile(&decision.routed_input, plan_summary.as_deref(), sink.as_deref_mut())
            .await?;
        total.accumulate(&compiled.usage);
        result.insert("instruction_usage", json!(compiled.usage));
        ensure_open(&sink, PipelineStage::Instructing)?;
        let mut instruction = compiled.instruction;

        enter(&mut sink, PipelineStage::Executing).await;
        let mut retrieved = self.retrieval.run(&instruction, sink.as_deref_mut()).await;
        ensure_open(&sink, PipelineStage::Executing)?;

        if self.options.reflection_enabled && needs_reflection(&retrieved) {
            let error = retrieved.error_text();
            info!(%error, "retrieval failed, reflecting once");

            enter(&mut sink, PipelineStage::Reflecting).await;
            let reflection = self
                .reflection
                .reflect(
                    ReflectionInput {
                        question,
                        plan_summary: plan_summary.as_deref(),
                        failed_instruction: &instruction,
                        error: &error,
                    },
                    sink.as_deref_mut(),
                )
                .await?;
            total.accumulate(&reflection.usage);
            result.insert("reflection_usage", json!(reflection.usage));
            ensure_open(&sink, PipelineStage::Reflecting)?;

            if let Some(corrected) = reflection.instruction {
                instruction = corrected;
                enter(&mut sink, PipelineStage::ReExecuting).await;
                retrieved = self.retrieval.run(&instruction, sink.as_deref_mut()).await;
                ensure_open(&sink, PipelineStage::ReExecuting)?;
                if needs_reflection(&retrieved) {
                    warn!("retrieval failed again, passing failure to synthesis");
                }
            }
        }

        result.insert("db_instruction", json!(instruction));
        result.extend_metadata(&retrieved.metadata);

        enter(&mut sink, PipelineStage::Synthesizing).await;
        debug!(chars = retrieved.output.len(), "synthesizing answer");
        let generated = self
            .synthesize(question, &retrieved.output, sink.as_deref_mut())
            .await?;
        total.accumulate(&generated.usage);
        ensure_open(&sink, PipelineStage::Synthesizing)?;

        result.output = generated.content.trim().to_string();
        result.insert("usage", json!(generated.usage));
        result.insert("total_usage", json!(total));
        Ok(result)
    }
}

/// Announce a stage on the stream, if any.
async fn enter(sink: &mut Option<&mut EventSink>, stage: PipelineStage) {
    debug!(%stage, "entering stage");
    if let (Some(sink), Some(line)) = (sink.as_deref_mut(), stage.status_line()) {
        sink.thinking(line).await;
    }
}
