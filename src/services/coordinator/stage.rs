//! Coordinator stages and their streaming status lines.

use std::fmt;

/// States of the coordinator, in the order they can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Routing,
    Conversational,
    Planning,
    Instructing,
    Executing,
    Reflecting,
    ReExecuting,
    Synthesizing,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Routing => "routing",
            PipelineStage::Conversational => "conversational",
            PipelineStage::Planning => "planning",
            PipelineStage::Instructing => "instructing",
            PipelineStage::Executing => "executing",
            PipelineStage::Reflecting => "reflecting",
            PipelineStage::ReExecuting => "re-executing",
            PipelineStage::Synthesizing => "synthesizing",
        }
    }

    /// Thinking line emitted when a streamed request enters this stage.
    pub fn status_line(&self) -> Option<&'static str> {
        match self {
            PipelineStage::Planning => Some("Planning retrieval...\n"),
            PipelineStage::Instructing => Some("Preparing database instruction...\n"),
            PipelineStage::Executing => Some("Querying database...\n"),
            PipelineStage::Reflecting => Some("Retrieval failed, revising instruction...\n"),
            PipelineStage::ReExecuting => Some("Retrying with revised instruction...\n"),
            PipelineStage::Synthesizing => Some("Synthesizing response...\n"),
            PipelineStage::Routing | PipelineStage::Conversational => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
