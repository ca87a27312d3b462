//! Settings Models
//!
//! Application configuration stored in config.json.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use agent_m_llm::ProviderConfig;

/// Environment variable holding the provider API key
pub const ENV_API_KEY: &str = "AGENT_M_API_KEY";
/// Fallback API key variable
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Model override
pub const ENV_MODEL: &str = "AGENT_M_MODEL";
/// Provider base URL override
pub const ENV_BASE_URL: &str = "AGENT_M_BASE_URL";
/// Retrieval agent endpoint override
pub const ENV_RETRIEVAL_URL: &str = "AGENT_M_RETRIEVAL_URL";

/// Application configuration stored in config.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation provider settings
    #[serde(default)]
    pub llm: ProviderConfig,
    /// Orchestration limits and switches
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Retrieval agent transport
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Prompt template overrides keyed by slug
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub prompts: HashMap<String, String>,
}

/// Pipeline limits and switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of plan sections kept
    #[serde(default = "default_max_sections")]
    pub max_sections: usize,
    /// Maximum rows kept per report section
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    /// Build a plan before compiling the retrieval instruction
    #[serde(default = "default_true")]
    pub planning_enabled: bool,
    /// Allow one corrective retry after a failed retrieval
    #[serde(default = "default_true")]
    pub reflection_enabled: bool,
    /// Upper bound for one retrieval call; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_timeout_secs: Option<u64>,
    /// Capacity of the internal fragment/event channels
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_max_sections() -> usize {
    6
}

fn default_max_rows() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_stream_buffer() -> usize {
    64
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_sections: default_max_sections(),
            max_rows: default_max_rows(),
            planning_enabled: true,
            reflection_enabled: true,
            retrieval_timeout_secs: None,
            stream_buffer: default_stream_buffer(),
        }
    }
}

/// HTTP retrieval agent settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Endpoint accepting `{"instruction": ...}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Bearer token sent to the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl AppConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.pipeline.max_sections == 0 {
            return Err("pipeline.max_sections must be at least 1".to_string());
        }
        if self.pipeline.max_rows == 0 {
            return Err("pipeline.max_rows must be at least 1".to_string());
        }
        if self.pipeline.stream_buffer == 0 {
            return Err("pipeline.stream_buffer must be at least 1".to_string());
        }
        if self.pipeline.retrieval_timeout_secs == Some(0) {
            return Err("pipeline.retrieval_timeout_secs must be positive".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err("llm.max_tokens must be at least 1".to_string());
        }
        if self.llm.request_timeout_secs == 0 || self.llm.connect_timeout_secs == 0 {
            return Err("llm timeouts must be positive".to_string());
        }
        if let Some(base_url) = &self.llm.base_url {
            validate_url("llm.base_url", base_url)?;
        }
        if let Some(endpoint) = &self.retrieval.endpoint {
            validate_url("retrieval.endpoint", endpoint)?;
        }
        Ok(())
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY).or_else(|| non_empty(ENV_OPENAI_API_KEY)) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.llm.model = model;
        }
        if let Some(base_url) = non_empty(ENV_BASE_URL) {
            self.llm.base_url = Some(base_url);
        }
        if let Some(endpoint) = non_empty(ENV_RETRIEVAL_URL) {
            self.retrieval.endpoint = Some(endpoint);
        }
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), String> {
    let parsed = url::Url::parse(value).map_err(|e| format!("{} is not a valid URL: {}", field, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{} must use http or https, got '{}'", field, other)),
    }
}
