//! Retrieval Execution
//!
//! `RetrievalRunner` wraps a retrieval agent so that every call yields a
//! `RetrievalResult`: transport errors, timeouts and streams that end without
//! a result all become failure results, which the reflection step can act on.

pub mod http;
pub mod table;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use agent_m_core::{CoreResult, RetrievalAgent, RetrievalResult, StreamEvent};

use crate::services::streaming::EventSink;

pub use http::HttpRetrievalAgent;
pub use table::{parse_table, ParsedTable};

/// Failure text used when a streamed retrieval produced no result event.
pub const NO_RESULT_MESSAGE: &str = "Database agent returned no result.";

/// Total wrapper around a retrieval agent.
#[derive(Clone)]
pub struct RetrievalRunner {
    agent: Arc<dyn RetrievalAgent>,
    timeout: Option<Duration>,
    buffer: usize,
}

impl RetrievalRunner {
    pub fn new(agent: Arc<dyn RetrievalAgent>, timeout: Option<Duration>, buffer: usize) -> Self {
        Self {
            agent,
            timeout,
            buffer: buffer.max(1),
        }
    }

    /// Whole call when `sink` is `None`, streamed call otherwise.
    pub async fn run(&self, instruction: &str, sink: Option<&mut EventSink>) -> RetrievalResult {
        match sink {
            Some(sink) => self.execute_streamed(instruction, sink).await,
            None => self.execute(instruction).await,
        }
    }

    /// Execute once and return the agent's complete result.
    pub async fn execute(&self, instruction: &str) -> RetrievalResult {
        let call = self.agent.execute(instruction);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => return self.timed_out(limit),
            },
            None => call.await,
        };
        self.settle(outcome)
    }

    /// Execute once, forwarding the agent's progress events into `sink`.
    ///
    /// The agent's `Result` event is intercepted and returned, never forwarded.
    pub async fn execute_streamed(&self, instruction: &str, sink: &mut EventSink) -> RetrievalResult {
        let (tx, rx) = mpsc::channel::<StreamEvent>(self.buffer);

        let producer = self.agent.execute_stream(instruction, tx);
        let consumer = async {
            let mut rx = rx;
            let mut captured: Option<RetrievalResult> = None;
            while let Some(event) = rx.recv().await {
                match event {
                    StreamEvent::Result(result) => captured = Some(result),
                    other => {
                        if !sink.forward(other).await {
                            debug!("sink closed during retrieval stream");
                            break;
                        }
                    }
                }
            }
            captured
        };
        let joined = async { tokio::join!(producer, consumer) };

        let (outcome, captured) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, joined).await {
                Ok(pair) => pair,
                Err(_) => return self.timed_out(limit),
            },
            None => joined.await,
        };

        match (captured, outcome) {
            (Some(result), _) => result,
            (None, Err(e)) => {
                warn!(agent = self.agent.name(), error = %e, "retrieval stream failed");
                RetrievalResult::failure(e.to_string())
            }
            (None, Ok(())) => {
                warn!(agent = self.agent.name(), "retrieval stream ended without a result");
                RetrievalResult::failure(NO_RESULT_MESSAGE)
            }
        }
    }

    fn settle(&self, outcome: CoreResult<RetrievalResult>) -> RetrievalResult {
        outcome.unwrap_or_else(|e| {
            warn!(agent = self.agent.name(), error = %e, "retrieval call failed");
            RetrievalResult::failure(e.to_string())
        })
    }

    fn timed_out(&self, limit: Duration) -> RetrievalResult {
        warn!(agent = self.agent.name(), ?limit, "retrieval call timed out");
        RetrievalResult::failure(format!("retrieval timed out after {:?}", limit))
    }
}
