//! Generation Relay
//!
//! Runs one text-generation call either whole or streamed. Streamed calls run
//! the provider (producer) and the demultiplexer (consumer) cooperatively on
//! the current task; reasoning goes to the sink as thinking events and answer
//! text is collected, and optionally forwarded as content.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use agent_m_core::{split_reasoning, StreamEvent, TagDemultiplexer};
use agent_m_llm::{GenerateConfig, LlmProvider, LlmResult, Message, UsageStats};

use super::sink::EventSink;

/// Which demultiplexed channels reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    /// Reasoning only; answer text is collected for parsing
    ThinkingOnly,
    /// Reasoning and answer text
    All,
}

/// Text produced by one generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generated {
    /// Answer text with reasoning removed
    pub content: String,
    /// Reasoning text, inline or out of band
    pub thinking: String,
    pub usage: UsageStats,
}

/// Runs generation calls against one provider.
#[derive(Clone)]
pub struct GenerationRelay {
    llm: Arc<dyn LlmProvider>,
    buffer: usize,
}

impl GenerationRelay {
    pub fn new(llm: Arc<dyn LlmProvider>, buffer: usize) -> Self {
        Self {
            llm,
            buffer: buffer.max(1),
        }
    }

    /// Whole call when `sink` is `None`, streamed call otherwise.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
        sink: Option<&mut EventSink>,
        forward: Forward,
    ) -> LlmResult<Generated> {
        match sink {
            Some(sink) => self.streamed(messages, config, sink, forward).await,
            None => self.whole(messages, config).await,
        }
    }

    /// One complete call; inline reasoning is split off the answer.
    pub async fn whole(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
    ) -> LlmResult<Generated> {
        let response = self.llm.send_message(messages, config).await?;
        let (inline_thinking, content) = split_reasoning(response.text());
        let thinking = match response.thinking {
            Some(mut out_of_band) => {
                out_of_band.push_str(&inline_thinking);
                out_of_band
            }
            None => inline_thinking,
        };
        Ok(Generated {
            content,
            thinking,
            usage: response.usage,
        })
    }

    /// One streamed call relayed through the demultiplexer into `sink`.
    ///
    /// Stops consuming as soon as the sink closes; the provider notices the
    /// dropped fragment receiver and returns early.
    pub async fn streamed(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
        sink: &mut EventSink,
        forward: Forward,
    ) -> LlmResult<Generated> {
        let (tx, rx) = mpsc::channel::<String>(self.buffer);

        let producer = self.llm.stream_message(messages, config, tx);
        let consumer = async {
            let mut rx = rx;
            let mut demux = TagDemultiplexer::new();
            let mut collected = Generated::default();

            while let Some(fragment) = rx.recv().await {
                for event in demux.push(&fragment) {
                    if !relay(event, sink, forward, &mut collected).await {
                        debug!("sink closed mid-generation, abandoning stream");
                        return collected;
                    }
                }
            }
            for event in demux.finish() {
                if !relay(event, sink, forward, &mut collected).await {
                    break;
                }
            }
            collected
        };

        let (response, mut collected) = tokio::join!(producer, consumer);
        let response = response?;
        collected.usage = response.usage;
        Ok(collected)
    }
}

async fn relay(
    event: StreamEvent,
    sink: &mut EventSink,
    forward: Forward,
    collected: &mut Generated,
) -> bool {
    match event {
        StreamEvent::Thinking { content } => {
            collected.thinking.push_str(&content);
            sink.thinking(content).await
        }
        StreamEvent::Content { content } => {
            collected.content.push_str(&content);
            match forward {
                Forward::All => sink.content(content).await,
                Forward::ThinkingOnly => !sink.is_closed(),
            }
        }
        StreamEvent::Result(_) | StreamEvent::Done => !sink.is_closed(),
    }
}
