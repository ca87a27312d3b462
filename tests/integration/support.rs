//! Test doubles: a text-generation provider scripted per pipeline stage and
//! a retrieval agent that replays results and records instructions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use agent_m::services::prompts::{self, PromptLibrary, PromptResolver};
use agent_m::{Coordinator, PipelineConfig, ReportAgent};
use agent_m_core::{CoreError, CoreResult, RetrievalAgent, RetrievalResult, StreamEvent, WireEvent};
use agent_m_llm::{
    GenerateConfig, LlmError, LlmProvider, LlmResponse, LlmResult, Message, UsageStats,
};

/// Characters per streamed fragment; small so delimiters straddle fragments.
const FRAGMENT_CHARS: usize = 2;

/// Slugs whose system prompt identifies a stage.
const STAGE_SLUGS: &[&str] = &[
    prompts::ROUTING_SYSTEM,
    prompts::REPORT_PLAN_SYSTEM,
    prompts::DB_COMMAND_SYSTEM,
    prompts::DB_REFLECTION_SYSTEM,
    prompts::SYNTHESIS_SYSTEM,
    prompts::GENERAL_SYSTEM,
    prompts::REPORT_COMPILE_SYSTEM,
];

/// One recorded provider call.
#[derive(Debug, Clone)]
pub struct Call {
    pub stage: &'static str,
    pub messages: Vec<Message>,
    pub config: GenerateConfig,
    pub streamed: bool,
}

impl Call {
    /// Text of the last (user) message.
    pub fn user_text(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or("")
    }
}

/// Provider that answers by stage, identified from the system prompt.
pub struct StageLlm {
    templates: Vec<(&'static str, String)>,
    scripts: Mutex<HashMap<&'static str, Vec<LlmResult<String>>>>,
    calls: Mutex<Vec<Call>>,
}

impl StageLlm {
    pub fn new() -> Self {
        let library = PromptLibrary::new();
        let templates = STAGE_SLUGS
            .iter()
            .map(|slug| (*slug, library.resolve(slug).unwrap()))
            .collect();
        Self {
            templates,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue responses for `stage`.
    pub fn on(self, stage: &'static str, responses: &[&str]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .extend(responses.iter().map(|r| Ok(r.to_string())));
        self
    }

    /// Queue a transport failure for `stage`.
    pub fn fail(self, stage: &'static str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .push(Err(LlmError::NetworkError {
                message: "connection reset".to_string(),
            }));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<&'static str> {
        self.calls().iter().map(|c| c.stage).collect()
    }

    pub fn calls_for(&self, stage: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.stage == stage).collect()
    }

    fn answer(&self, messages: Vec<Message>, config: GenerateConfig, streamed: bool) -> LlmResult<String> {
        let system = messages.first().map(|m| m.content.clone()).unwrap_or_default();
        let stage = self
            .templates
            .iter()
            .find(|(_, template)| *template == system)
            .map(|(slug, _)| *slug)
            .unwrap_or("unknown");

        self.calls.lock().unwrap().push(Call {
            stage,
            messages,
            config,
            streamed,
        });

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(stage) {
            Some(queue) if !queue.is_empty() => queue.remove(0),
            _ => Err(LlmError::Other {
                message: format!("no scripted response for stage {}", stage),
            }),
        }
    }
}

fn response(text: String) -> LlmResponse {
    let mut response = LlmResponse::from_text(text, "stage-mock");
    response.usage = UsageStats::new(10, 5);
    response
}

#[async_trait]
impl LlmProvider for StageLlm {
    fn name(&self) -> &'static str {
        "stage-mock"
    }

    fn model(&self) -> &str {
        "stage-mock"
    }

    async fn send_message(&self, messages: Vec<Message>, config: GenerateConfig) -> LlmResult<LlmResponse> {
        self.answer(messages, config, false).map(response)
    }

    async fn stream_message(
        &self,
        messages: Vec<Message>,
        config: GenerateConfig,
        tx: mpsc::Sender<String>,
    ) -> LlmResult<LlmResponse> {
        let text = self.answer(messages, config, true)?;
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(FRAGMENT_CHARS) {
            if tx.send(chunk.iter().collect()).await.is_err() {
                break;
            }
        }
        Ok(response(text))
    }
}

/// What the scripted retrieval agent does for one call.
#[derive(Debug, Clone)]
pub enum Step {
    Return(RetrievalResult),
    Fail(String),
    /// Stream progress but never send a result
    NoResult,
    /// Hold the call open longer than any configured retrieval timeout
    Stall,
}

/// How long a `Step::Stall` call stays open.
pub const STALL: Duration = Duration::from_secs(10);

/// Retrieval agent replaying scripted steps; streams one progress line per call.
pub struct ScriptedRetrieval {
    steps: Mutex<Vec<Step>>,
    repeat_last: bool,
    instructions: Mutex<Vec<String>>,
}

impl ScriptedRetrieval {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps),
            repeat_last: false,
            instructions: Mutex::new(Vec::new()),
        }
    }

    /// Agent that fails every call with `error`.
    pub fn always_failing(error: &str) -> Self {
        Self {
            steps: Mutex::new(vec![Step::Return(
                RetrievalResult::new("query failed").with_metadata("error", error.into()),
            )]),
            repeat_last: true,
            instructions: Mutex::new(Vec::new()),
        }
    }

    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }

    fn next_step(&self, instruction: &str) -> Step {
        self.instructions.lock().unwrap().push(instruction.to_string());
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 || (!steps.is_empty() && !self.repeat_last) {
            steps.remove(0)
        } else if let Some(last) = steps.first() {
            last.clone()
        } else {
            Step::Return(RetrievalResult::failure("no scripted step"))
        }
    }
}

#[async_trait]
impl RetrievalAgent for ScriptedRetrieval {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(&self, instruction: &str) -> CoreResult<RetrievalResult> {
        match self.next_step(instruction) {
            Step::Return(result) => Ok(result),
            Step::Fail(message) => Err(CoreError::retrieval(message)),
            Step::NoResult => Err(CoreError::retrieval("no result")),
            Step::Stall => {
                tokio::time::sleep(STALL).await;
                Ok(RetrievalResult::new("late rows"))
            }
        }
    }

    async fn execute_stream(&self, instruction: &str, tx: mpsc::Sender<StreamEvent>) -> CoreResult<()> {
        let step = self.next_step(instruction);
        let send = |event| {
            let tx = tx.clone();
            async move {
                tx.send(event)
                    .await
                    .map_err(|_| CoreError::stream_closed("receiver dropped"))
            }
        };
        send(StreamEvent::thinking(format!("Executing: {}\n", instruction))).await?;
        match step {
            Step::Return(result) => {
                send(StreamEvent::Result(result)).await?;
                send(StreamEvent::Done).await
            }
            Step::Fail(message) => Err(CoreError::retrieval(message)),
            Step::NoResult => send(StreamEvent::Done).await,
            Step::Stall => {
                tokio::time::sleep(STALL).await;
                send(StreamEvent::Result(RetrievalResult::new("late rows"))).await?;
                send(StreamEvent::Done).await
            }
        }
    }
}

/// Successful retrieval output with a two-row table.
pub fn fcr_rows() -> RetrievalResult {
    RetrievalResult::new("Found 2 rows.\n\npond | fcr\n--- | ---\nF1 | 1.32\nF1 | 1.35")
        .with_metadata("sql", "SELECT pond, fcr FROM cultivation".into())
}

pub fn coordinator(llm: &Arc<StageLlm>, retrieval: &Arc<ScriptedRetrieval>) -> Coordinator {
    coordinator_with(llm, retrieval, PipelineConfig::default())
}

pub fn coordinator_with(
    llm: &Arc<StageLlm>,
    retrieval: &Arc<ScriptedRetrieval>,
    options: PipelineConfig,
) -> Coordinator {
    Coordinator::new(
        llm.clone(),
        retrieval.clone(),
        Arc::new(PromptLibrary::new()),
        options,
    )
}

pub fn report_agent(llm: &Arc<StageLlm>, retrieval: &Arc<ScriptedRetrieval>, options: &PipelineConfig) -> ReportAgent {
    ReportAgent::new(
        llm.clone(),
        retrieval.clone(),
        Arc::new(PromptLibrary::new()),
        options,
    )
}

/// Receive every event until the channel closes.
pub async fn collect<T>(mut rx: mpsc::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

pub fn thinking_text(events: &[WireEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            WireEvent::Thinking { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

pub fn content_text(events: &[WireEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            WireEvent::Content { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

pub const QUESTION: &str = "berapa FCR kolam F1?";
pub const ROUTE_DATABASE: &str =
    r#"{"agent":"database","reasoning":"butuh data","routed_input":"Ambil FCR kolam F1"}"#;
pub const ONE_SECTION_PLAN: &str =
    r#"{"title":"FCR","sections":[{"title":"FCR kolam F1","instruction":"Ambil FCR kolam F1"}]}"#;
pub const SYNTHESIS_ANSWER: &str = "<think>dua sampel, ambil terbaru</think>FCR kolam F1 saat ini **1.35**.";
