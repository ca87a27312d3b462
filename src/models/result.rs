//! Pipeline Result
//!
//! The composed answer returned by the coordinator and the report agent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use agent_m_core::{RetrievalResult, ERROR_MARKER};

/// Final output of one request: answer text plus accumulated metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub output: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AgentResult {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            metadata: Map::new(),
        }
    }

    /// Explicit typed error result: `"Error: <message>"` with `metadata.error = code`.
    pub fn error(message: &str, code: &str) -> Self {
        Self::new(format!("{} {}", ERROR_MARKER, message)).with("error", Value::from(code))
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Copy every key of `other` into this result's metadata.
    pub fn extend_metadata(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.metadata.contains_key("error")
    }
}

impl From<AgentResult> for RetrievalResult {
    fn from(result: AgentResult) -> Self {
        RetrievalResult {
            output: result.output,
            metadata: result.metadata,
        }
    }
}

impl From<RetrievalResult> for AgentResult {
    fn from(result: RetrievalResult) -> Self {
        AgentResult {
            output: result.output,
            metadata: result.metadata,
        }
    }
}
