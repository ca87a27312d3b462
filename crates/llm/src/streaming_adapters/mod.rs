//! Provider-Specific Stream Adapters
//!
//! Turn a provider's raw SSE byte stream into plain text fragments.

pub mod openai;
pub mod sse;

pub use openai::{ChunkEvent, OpenAIAdapter};
pub use sse::SseLineBuffer;
