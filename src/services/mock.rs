//! Test doubles shared by the service unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use agent_m_core::{CoreResult, RetrievalAgent, RetrievalResult};
use agent_m_llm::{
    GenerateConfig, LlmError, LlmProvider, LlmResponse, LlmResult, Message, UsageStats,
};

/// Fragment size used when streaming scripted responses.
const FRAGMENT_CHARS: usize = 3;

/// A mock LLM provider that returns predefined responses in sequence.
pub(crate) struct ScriptedLlm {
    responses: Mutex<Vec<LlmResult<String>>>,
    calls: Mutex<Vec<(Vec<Message>, GenerateConfig)>>,
}

impl ScriptedLlm {
    pub(crate) fn new(texts: Vec<&str>) -> Self {
        Self::with_results(texts.into_iter().map(|t| Ok(t.to_string())).collect())
    }

    pub(crate) fn with_results(responses: Vec<LlmResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(Vec<Message>, GenerateConfig)> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, messages: Vec<Message>, config: GenerateConfig) -> LlmResult<String> {
        self.calls.lock().unwrap().push((messages, config));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(LlmError::Other {
                message: "no more scripted responses".to_string(),
            })
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
    ) -> LlmResult<LlmResponse> {
        let text = self.next(messages, config)?;
        let mut response = LlmResponse::from_text(text, "mock-model");
        response.usage = UsageStats::new(10, 5);
        Ok(response)
    }

    async fn stream_message(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
        tx: mpsc::Sender<String>,
    ) -> LlmResult<LlmResponse> {
        let text = self.next(messages, config)?;
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(FRAGMENT_CHARS) {
            if tx.send(chunk.iter().collect()).await.is_err() {
                break;
            }
        }
        let mut response = LlmResponse::from_text(text, "mock-model");
        response.usage = UsageStats::new(10, 5);
        Ok(response)
    }
}

/// Retrieval agent that replays scripted results and records instructions.
pub(crate) struct ScriptedRetrieval {
    results: Mutex<Vec<RetrievalResult>>,
    instructions: Mutex<Vec<String>>,
}

impl ScriptedRetrieval {
    pub(crate) fn new(results: Vec<RetrievalResult>) -> Self {
        Self {
            results: Mutex::new(results),
            instructions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalAgent for ScriptedRetrieval {
    async fn execute(&self, instruction: &str) -> CoreResult<RetrievalResult> {
        self.instructions.lock().unwrap().push(instruction.to_string());
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            Ok(RetrievalResult::failure("no scripted result"))
        } else {
            Ok(results.remove(0))
        }
    }
}
