//! Agent M Core
//!
//! Foundational types for the Agent M workspace. This crate has no dependency
//! on any LLM provider or application-level code.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `streaming` - Internal and wire stream events
//! - `demux` - Incremental `<think>` tag demultiplexer
//! - `retrieval` - Retrieval agent interface and result type

pub mod demux;
pub mod error;
pub mod retrieval;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Streaming Types ────────────────────────────────────────────────────
pub use demux::{demultiplex, split_reasoning, TagDemultiplexer, THINK_CLOSE, THINK_OPEN};
pub use streaming::{StreamEvent, StreamKind, WireEvent};

// ── Retrieval ──────────────────────────────────────────────────────────
pub use retrieval::{RetrievalAgent, RetrievalResult, ERROR_MARKER};
