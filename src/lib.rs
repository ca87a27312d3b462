//! Agent M
//!
//! Answers operational questions by routing each one either to a
//! conversational responder or to a structured data-retrieval path, then
//! composing a natural-language answer. It includes:
//! - The execution coordinator (whole-result and streaming modes)
//! - Planner stages: routing, planning, instruction compilation, reflection
//! - Report mode
//! - Configuration loading and prompt resolution

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::result::AgentResult;
pub use models::settings::{AppConfig, PipelineConfig, RetrievalConfig};
pub use services::coordinator::Coordinator;
pub use services::prompts::{PromptLibrary, PromptResolver};
pub use services::report::ReportAgent;
pub use storage::config::ConfigService;
pub use utils::error::{AppError, AppResult, PlanError};
