//! Event Sink
//!
//! Outbound side of a streaming request. Dropping the receiver is the only
//! cancellation signal; once a send fails the sink is closed for good and
//! every later send is a no-op.

use tokio::sync::mpsc;
use tracing::debug;

use agent_m_core::{StreamEvent, WireEvent};

/// Sender of wire events with sticky closed state.
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<WireEvent>,
    closed: bool,
    sent: usize,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<WireEvent>) -> Self {
        Self {
            tx,
            closed: false,
            sent: 0,
        }
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of events delivered so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Send one wire event. Empty text events are skipped.
    ///
    /// Returns `false` once the sink is closed.
    pub async fn send(&mut self, event: WireEvent) -> bool {
        if self.closed {
            return false;
        }
        if event.is_empty() {
            return true;
        }
        match self.tx.send(event).await {
            Ok(()) => {
                self.sent += 1;
                true
            }
            Err(_) => {
                debug!(sent = self.sent, "event receiver dropped, closing sink");
                self.closed = true;
                false
            }
        }
    }

    /// Forward an event produced by a sub-stream.
    ///
    /// `Result` and `Done` belong to the sub-stream and are never forwarded.
    pub async fn forward(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Thinking { content } => self.send(WireEvent::Thinking { content }).await,
            StreamEvent::Content { content } => self.send(WireEvent::Content { content }).await,
            StreamEvent::Result(_) | StreamEvent::Done => !self.closed,
        }
    }

    pub async fn thinking(&mut self, content: impl Into<String>) -> bool {
        self.send(WireEvent::Thinking {
            content: content.into(),
        })
        .await
    }

    pub async fn content(&mut self, content: impl Into<String>) -> bool {
        self.send(WireEvent::Content {
            content: content.into(),
        })
        .await
    }

    /// Terminal event.
    pub async fn done(&mut self) -> bool {
        self.send(WireEvent::Done).await
    }
}
