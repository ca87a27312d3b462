//! Stream Tag Demultiplexer
//!
//! Splits a sequence of arbitrarily-sized text fragments into typed
//! `Thinking` / `Content` events based on inline `<think>` / `</think>`
//! delimiters. Detection runs on an accumulation buffer, so a delimiter split
//! across any number of fragments is still recognized.
//!
//! Guarantees:
//! - the concatenation of all emitted payloads equals the input with every
//!   delimiter removed
//! - delimiters never appear in output
//! - no event carries an empty payload
//! - an unterminated reasoning section is flushed as `Thinking` at stream end

use crate::streaming::{StreamEvent, StreamKind};

/// Opening reasoning delimiter
pub const THINK_OPEN: &str = "<think>";
/// Closing reasoning delimiter
pub const THINK_CLOSE: &str = "</think>";

/// State machine for parsing think tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ThinkState {
    /// Not in a thinking block, looking for `<think>`
    #[default]
    Normal,
    /// Inside a thinking block, looking for `</think>`
    InThinking,
}

impl ThinkState {
    fn delimiter(self) -> &'static str {
        match self {
            ThinkState::Normal => THINK_OPEN,
            ThinkState::InThinking => THINK_CLOSE,
        }
    }

    fn kind(self) -> StreamKind {
        match self {
            ThinkState::Normal => StreamKind::Content,
            ThinkState::InThinking => StreamKind::Thinking,
        }
    }

    fn toggled(self) -> Self {
        match self {
            ThinkState::Normal => ThinkState::InThinking,
            ThinkState::InThinking => ThinkState::Normal,
        }
    }
}

/// Incremental demultiplexer for one stream.
///
/// Create one per stream; it is not meant to be shared across streams.
#[derive(Debug, Default)]
pub struct TagDemultiplexer {
    state: ThinkState,
    buffer: String,
}

impl TagDemultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment, returning every event that can be emitted safely.
    pub fn push(&mut self, fragment: &str) -> Vec<StreamEvent> {
        if fragment.is_empty() {
            return Vec::new();
        }
        self.buffer.push_str(fragment);
        self.process_buffer()
    }

    /// Signal end of stream and flush whatever is still buffered, tagged by
    /// the current mode. The demultiplexer can be reused afterwards.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = self.process_buffer();
        let rest = std::mem::take(&mut self.buffer);
        push_text(&mut events, self.state.kind(), &rest);
        self.state = ThinkState::Normal;
        events
    }

    /// Process buffered content and extract thinking/text events
    fn process_buffer(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        loop {
            let delimiter = self.state.delimiter();
            let kind = self.state.kind();

            if let Some(pos) = self.buffer.find(delimiter) {
                push_text(&mut events, kind, &self.buffer[..pos]);
                self.buffer.drain(..pos + delimiter.len());
                self.state = self.state.toggled();
                continue;
            }

            // Hold back a tail that could be the start of a split delimiter
            let held = partial_delimiter_len(&self.buffer, delimiter);
            let safe_len = self.buffer.len() - held;
            if safe_len > 0 {
                let text: String = self.buffer.drain(..safe_len).collect();
                push_text(&mut events, kind, &text);
            }
            break;
        }

        events
    }
}

/// Byte length of the longest proper prefix of `delimiter` that `buffer` ends with.
fn partial_delimiter_len(buffer: &str, delimiter: &str) -> usize {
    let max = (delimiter.len() - 1).min(buffer.len());
    (1..=max)
        .rev()
        .find(|&n| buffer.ends_with(&delimiter[..n]))
        .unwrap_or(0)
}

/// Append text to the event list, merging with a trailing event of the same
/// kind. Empty text is dropped.
fn push_text(events: &mut Vec<StreamEvent>, kind: StreamKind, text: &str) {
    if text.is_empty() {
        return;
    }
    match (events.last_mut(), kind) {
        (Some(StreamEvent::Thinking { content }), StreamKind::Thinking)
        | (Some(StreamEvent::Content { content }), StreamKind::Content) => {
            content.push_str(text);
        }
        _ => events.push(StreamEvent::text(kind, text)),
    }
}

/// Demultiplex a complete sequence of fragments in one go.
pub fn demultiplex<'a, I>(fragments: I) -> Vec<StreamEvent>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut demux = TagDemultiplexer::new();
    let mut events = Vec::new();
    for fragment in fragments {
        events.extend(demux.push(fragment));
    }
    events.extend(demux.finish());
    events
}

/// Split a complete text into its reasoning and answer parts.
pub fn split_reasoning(text: &str) -> (String, String) {
    let mut thinking = String::new();
    let mut content = String::new();
    for event in demultiplex([text]) {
        match event {
            StreamEvent::Thinking { content: t } => thinking.push_str(&t),
            StreamEvent::Content { content: c } => content.push_str(&c),
            _ => {}
        }
    }
    (thinking, content)
}
