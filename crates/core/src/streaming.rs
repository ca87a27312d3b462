//! Stream Event Types
//!
//! Typed events flowing out of a pipeline run. `StreamEvent` is the internal
//! representation shared by the demultiplexer, retrieval agents and the
//! coordinator; `WireEvent` is the subset that may leave the process.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::retrieval::RetrievalResult;

/// Which logical channel a piece of generated text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Model-internal deliberation (inside `<think>` tags)
    Thinking,
    /// Final answer text
    Content,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Thinking => write!(f, "thinking"),
            StreamKind::Content => write!(f, "content"),
        }
    }
}

/// Internal stream event.
///
/// Events are emitted in generation order. `Result` carries the final
/// structured output of a streaming sub-call (e.g. a retrieval agent) and is
/// intercepted by the consumer; it is never forwarded to the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Reasoning text
    Thinking { content: String },
    /// Answer text
    Content { content: String },
    /// Final structured result of a streaming sub-call
    Result(RetrievalResult),
    /// End of stream
    Done,
}

impl StreamEvent {
    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking {
            content: content.into(),
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self::Content {
            content: content.into(),
        }
    }

    /// Build a text event for the given channel.
    pub fn text(kind: StreamKind, content: impl Into<String>) -> Self {
        match kind {
            StreamKind::Thinking => Self::thinking(content),
            StreamKind::Content => Self::content(content),
        }
    }

    /// The text channel of this event, if it is a text event.
    pub fn kind(&self) -> Option<StreamKind> {
        match self {
            StreamEvent::Thinking { .. } => Some(StreamKind::Thinking),
            StreamEvent::Content { .. } => Some(StreamKind::Content),
            _ => None,
        }
    }

    /// Text payload of a thinking/content event.
    pub fn text_payload(&self) -> Option<&str> {
        match self {
            StreamEvent::Thinking { content } | StreamEvent::Content { content } => {
                Some(content.as_str())
            }
            _ => None,
        }
    }
}

/// Event shape exposed to callers in streaming mode.
///
/// Serializes as `{"type": "thinking"|"content", "content": ...}` followed by
/// a terminal `{"type": "done"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Thinking { content: String },
    Content { content: String },
    Done,
}

impl WireEvent {
    /// True for text events with an empty payload. Such events are never sent.
    pub fn is_empty(&self) -> bool {
        match self {
            WireEvent::Thinking { content } | WireEvent::Content { content } => content.is_empty(),
            WireEvent::Done => false,
        }
    }

    /// Frame this event for a server-sent-events transport.
    pub fn to_sse_frame(&self) -> CoreResult<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

impl TryFrom<StreamEvent> for WireEvent {
    type Error = CoreError;

    fn try_from(event: StreamEvent) -> Result<Self, Self::Error> {
        match event {
            StreamEvent::Thinking { content } => Ok(WireEvent::Thinking { content }),
            StreamEvent::Content { content } => Ok(WireEvent::Content { content }),
            StreamEvent::Done => Ok(WireEvent::Done),
            StreamEvent::Result(_) => Err(CoreError::validation(
                "result events are internal and cannot be sent on the wire",
            )),
        }
    }
}
