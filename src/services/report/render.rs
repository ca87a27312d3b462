//! Report Rendering
//!
//! Deterministic markdown rendering used when the compile call does not return
//! a usable `{"report": {...}}` payload.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::services::planner::{RetrievalPlan, DEFAULT_REPORT_TITLE};

pub const FALLBACK_FILENAME: &str = "report.md";
const NO_DATA: &str = "_(no data)_";

/// Outcome of retrieving one report section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionResult {
    pub title: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Capped display rows
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    /// True row count before capping
    #[serde(default)]
    pub row_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SectionResult {
    pub fn failed(title: impl Into<String>, instruction: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            instruction: instruction.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Markdown table, or a no-data marker when there are no columns.
pub fn table_to_markdown(columns: &[String], rows: &[Vec<String>], max_rows: usize) -> String {
    if columns.is_empty() {
        return NO_DATA.to_string();
    }
    let mut lines = Vec::with_capacity(rows.len().min(max_rows) + 2);
    lines.push(format!("| {} |", columns.join(" | ")));
    lines.push(format!("| {} |", vec!["---"; columns.len()].join(" | ")));
    for row in rows.iter().take(max_rows) {
        lines.push(format!("| {} |", row.join(" | ")));
    }
    lines.join("\n")
}

/// Render the whole report as markdown.
pub fn render_markdown(plan: &RetrievalPlan, sections: &[SectionResult], max_rows: usize) -> String {
    let title = if plan.title.is_empty() {
        DEFAULT_REPORT_TITLE
    } else {
        plan.title.as_str()
    };
    let mut lines = vec![format!("# {}", title)];
    if !plan.period.is_empty() {
        lines.push(format!("_Periode: {}_", plan.period));
    }
    lines.push(String::new());

    for section in sections {
        lines.push(format!("## {}", section.title));
        match &section.error {
            Some(error) => lines.push(format!("Catatan: {}", error)),
            None => lines.push(table_to_markdown(&section.columns, &section.rows, max_rows)),
        }
        lines.push(String::new());
    }

    lines.join("\n").trim().to_string()
}

/// `{"report": {...}}` payload built without the model.
pub fn fallback_report(plan: &RetrievalPlan, sections: &[SectionResult], max_rows: usize) -> Value {
    let title = if plan.title.is_empty() {
        DEFAULT_REPORT_TITLE
    } else {
        plan.title.as_str()
    };
    json!({
        "report": {
            "title": title,
            "period": plan.period,
            "format": "markdown",
            "filename": FALLBACK_FILENAME,
            "content": render_markdown(plan, sections, max_rows),
            "generated_at": chrono::Utc::now().to_rfc3339(),
        }
    })
}

/// Set `report.query` to the question unless the payload already has one.
pub fn attach_query(mut payload: Value, question: &str) -> Value {
    if let Some(report) = payload.get_mut("report").and_then(Value::as_object_mut) {
        report
            .entry("query")
            .or_insert_with(|| Value::String(question.to_string()));
    }
    payload
}
