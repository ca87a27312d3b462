//! Planner Components
//!
//! The decision-making stages of the pipeline, each one text-generation call:
//! routing, planning, instruction compilation and reflection.

pub mod instruction;
pub mod plan;
pub mod reflection;
pub mod routing;

pub use instruction::{clean_instruction, compose_intent, Compiled, InstructionCompiler};
pub use plan::{
    PlanBuilder, PlanSection, Planned, ReportFormat, RetrievalPlan, DEFAULT_REPORT_TITLE,
    EMPTY_INSTRUCTION,
};
pub use reflection::{needs_reflection, Reflection, ReflectionInput, ReflectionLoop, NO_PLAN};
pub use routing::{RouteTarget, Routed, RoutingDecision, RoutingResolver};
