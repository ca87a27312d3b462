//! Report Mode
//!
//! Plan-driven multi-section reports built on the same planner and retrieval
//! plumbing as the question-answering pipeline.

pub mod agent;
pub mod render;

pub use agent::{ReportAgent, PLAN_FAILED_CODE, PLAN_FAILED_MESSAGE};
pub use render::{attach_query, fallback_report, render_markdown, table_to_markdown, SectionResult};
