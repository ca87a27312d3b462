//! Plan Builder
//!
//! Turns a routed request into a bounded, ordered set of retrieval
//! sub-instructions. A payload without a non-empty `sections` array is
//! rejected, never defaulted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use agent_m_llm::{GenerateConfig, Message, UsageStats};

use crate::services::prompts::{render, PromptResolver, REPORT_PLAN_SYSTEM, REPORT_PLAN_USER};
use crate::services::streaming::{EventSink, Forward, GenerationRelay};
use crate::utils::error::PlanError;
use crate::utils::text::{parse_json_object, string_field};

pub const DEFAULT_REPORT_TITLE: &str = "Laporan Operasional";
/// Marker recorded for a section that arrived without an instruction.
pub const EMPTY_INSTRUCTION: &str = "Instruksi kosong.";

/// Output format requested for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Pdf,
}

impl ReportFormat {
    fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "pdf" => ReportFormat::Pdf,
            _ => ReportFormat::Markdown,
        }
    }
}

/// One planned section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSection {
    pub title: String,
    /// Empty when the planner left it out
    #[serde(default)]
    pub instruction: String,
}

impl PlanSection {
    pub fn is_valid(&self) -> bool {
        !self.instruction.is_empty()
    }
}

/// Validated plan. Always has at least one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalPlan {
    pub title: String,
    pub period: String,
    pub format: ReportFormat,
    pub sections: Vec<PlanSection>,
}

impl RetrievalPlan {
    /// Validate a raw model response, keeping at most `max_sections` sections.
    pub fn parse(raw: &str, max_sections: usize) -> Result<Self, PlanError> {
        let payload = parse_json_object(raw)
            .ok_or_else(|| PlanError::unavailable("plan response is not a JSON object"))?;
        Self::from_payload(&payload, max_sections)
    }

    pub fn from_payload(payload: &Map<String, Value>, max_sections: usize) -> Result<Self, PlanError> {
        let sections = match payload.get("sections") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(Value::Array(_)) => return Err(PlanError::unavailable("plan has no sections")),
            Some(_) => return Err(PlanError::unavailable("plan sections is not an array")),
            None => return Err(PlanError::unavailable("plan is missing sections")),
        };

        let sections = sections
            .iter()
            .take(max_sections.max(1))
            .enumerate()
            .map(|(idx, item)| section_from_value(idx, item))
            .collect();

        Ok(Self {
            title: string_field(payload, "title").unwrap_or_else(|| DEFAULT_REPORT_TITLE.to_string()),
            period: string_field(payload, "period").unwrap_or_default(),
            format: string_field(payload, "format")
                .map(|f| ReportFormat::parse(&f))
                .unwrap_or_default(),
            sections,
        })
    }

    /// Human-readable summary handed to the instruction compiler.
    pub fn summary(&self) -> String {
        let mut lines = vec![self.title.clone()];
        if !self.period.is_empty() {
            lines.push(format!("Periode: {}", self.period));
        }
        for (idx, section) in self.sections.iter().enumerate() {
            let instruction = if section.is_valid() {
                section.instruction.as_str()
            } else {
                EMPTY_INSTRUCTION
            };
            lines.push(format!("{}. {}: {}", idx + 1, section.title, instruction));
        }
        lines.join("\n")
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn section_from_value(idx: usize, item: &Value) -> PlanSection {
    let default_title = || format!("Bagian {}", idx + 1);
    match item {
        Value::Object(map) => PlanSection {
            title: string_field(map, "title").unwrap_or_else(default_title),
            instruction: string_field(map, "instruction").unwrap_or_default(),
        },
        // A bare string is read as the instruction itself
        Value::String(text) => PlanSection {
            title: default_title(),
            instruction: text.trim().to_string(),
        },
        _ => PlanSection {
            title: default_title(),
            instruction: String::new(),
        },
    }
}

/// Plan plus the usage of the planning call.
#[derive(Debug, Clone)]
pub struct Planned {
    pub plan: RetrievalPlan,
    pub usage: UsageStats,
}

/// Builds plans with one deterministic text-generation call.
pub struct PlanBuilder {
    relay: GenerationRelay,
    prompts: Arc<dyn PromptResolver>,
    max_sections: usize,
}

impl PlanBuilder {
    pub fn new(relay: GenerationRelay, prompts: Arc<dyn PromptResolver>, max_sections: usize) -> Self {
        Self {
            relay,
            prompts,
            max_sections,
        }
    }

    fn build_messages(&self, request: &str) -> Result<Vec<Message>, PlanError> {
        Ok(vec![
            Message::system(self.prompts.resolve(REPORT_PLAN_SYSTEM)?),
            Message::user(render(
                &self.prompts.resolve(REPORT_PLAN_USER)?,
                &[("message", request)],
            )),
        ])
    }

    /// Plan `request`; reasoning streams to `sink` when given.
    pub async fn build(&self, request: &str, sink: Option<&mut EventSink>) -> Result<Planned, PlanError> {
        let messages = self.build_messages(request)?;
        let generated = self
            .relay
            .run(messages, GenerateConfig::deterministic(), sink, Forward::ThinkingOnly)
            .await?;

        match RetrievalPlan::parse(&generated.content, self.max_sections) {
            Ok(plan) => {
                info!(sections = plan.sections.len(), title = %plan.title, "plan built");
                Ok(Planned {
                    plan,
                    usage: generated.usage,
                })
            }
            Err(e) => {
                warn!(error = %e, "plan rejected");
                Err(e)
            }
        }
    }
}
