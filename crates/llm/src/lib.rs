//! Agent M LLM
//!
//! Text-generation capability used by the pipeline:
//! - `LlmProvider` trait (whole and streaming completions)
//! - request/response types and error taxonomy
//! - an OpenAI-compatible provider with SSE streaming
//! - the HTTP client factory carrying the timeout policy

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod streaming_adapters;
pub mod types;

// Re-export main types
pub use http_client::{build_client, build_http_client};
pub use openai::OpenAIProvider;
pub use provider::LlmProvider;
pub use types::*;

pub use streaming_adapters::{ChunkEvent, OpenAIAdapter, SseLineBuffer};
