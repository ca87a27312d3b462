//! Streaming Plumbing
//!
//! Bridges provider fragment streams to caller-facing wire events:
//! - `EventSink` owns the outbound wire channel and tracks cancellation
//! - `GenerationRelay` runs one text-generation call, whole or streamed,
//!   funneling streamed fragments through the tag demultiplexer

pub mod service;
pub mod sink;

// Re-export main types
pub use service::{Forward, Generated, GenerationRelay};
pub use sink::EventSink;
