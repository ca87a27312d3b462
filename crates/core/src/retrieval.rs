//! Retrieval Agent Interface
//!
//! The structured-data retrieval agent is an external collaborator: it takes a
//! natural-language instruction and returns tabular output plus metadata. The
//! only failure signal the pipeline inspects is `metadata.error` or an output
//! starting with [`ERROR_MARKER`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::{CoreError, CoreResult};
use crate::streaming::StreamEvent;

/// Prefix of a retrieval output that signals failure.
pub const ERROR_MARKER: &str = "Error:";

/// Output of one retrieval call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Text output (usually an explanation followed by a table)
    pub output: String,
    /// Free-form metadata; an `error` key marks failure
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RetrievalResult {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            metadata: Map::new(),
        }
    }

    /// Build a failed result carrying `message` both in the output and in
    /// `metadata.error`.
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut metadata = Map::new();
        metadata.insert("error".to_string(), Value::String(message.clone()));
        Self {
            output: format!("{} {}", ERROR_MARKER, message),
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The `metadata.error` value, if present and non-empty.
    pub fn metadata_error(&self) -> Option<String> {
        match self.metadata.get("error")? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Whether this result signals a failed retrieval.
    pub fn is_failure(&self) -> bool {
        self.metadata_error().is_some() || self.output.starts_with(ERROR_MARKER)
    }

    /// Human-readable error text: the metadata error, else the output.
    pub fn error_text(&self) -> String {
        self.metadata_error().unwrap_or_else(|| self.output.clone())
    }
}

/// Structured-data retrieval agent consumed by the pipeline.
#[async_trait]
pub trait RetrievalAgent: Send + Sync {
    /// Returns the agent name for logging.
    fn name(&self) -> &'static str {
        "retrieval"
    }

    /// Execute one instruction and return its complete result.
    async fn execute(&self, instruction: &str) -> CoreResult<RetrievalResult>;

    /// Execute one instruction, streaming progress events into `tx`.
    ///
    /// The final result must be sent as `StreamEvent::Result`; consumers
    /// intercept it and never forward it. The default implementation runs
    /// [`RetrievalAgent::execute`] and sends only the result.
    async fn execute_stream(
        &self,
        instruction: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> CoreResult<()> {
        let result = self.execute(instruction).await?;
        tx.send(StreamEvent::Result(result))
            .await
            .map_err(|_| CoreError::stream_closed("retrieval result receiver dropped"))
    }
}
