// Agent M - command-line entry point

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_m::services::retrieval::HttpRetrievalAgent;
use agent_m::{ConfigService, Coordinator, PromptLibrary, ReportAgent};
use agent_m_core::{StreamEvent, WireEvent};
use agent_m_llm::OpenAIProvider;

/// Ask Agent M an operational question.
#[derive(Debug, Parser)]
#[command(name = "agent-m", version, about)]
struct Cli {
    /// Path to config.json (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print server-sent-event frames as they are produced
    #[arg(long)]
    stream: bool,

    /// Build a multi-section report instead of answering
    #[arg(long)]
    report: bool,

    /// The question
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let question = cli.question.join(" ");

    let service = ConfigService::new(cli.config).context("failed to load configuration")?;
    info!(path = %service.path().display(), "configuration loaded");
    let config = service.into_config();

    let llm = Arc::new(OpenAIProvider::new(config.llm.clone()).context("failed to create provider")?);
    let retrieval = Arc::new(
        HttpRetrievalAgent::new(&config.retrieval, &config.llm)
            .context("failed to create retrieval agent")?,
    );
    let prompts = Arc::new(PromptLibrary::with_overrides(config.prompts.clone()));

    if cli.report {
        let agent = ReportAgent::new(llm, retrieval, prompts, &config.pipeline);
        if cli.stream {
            let (tx, mut rx) = mpsc::channel(config.pipeline.stream_buffer);
            let printer = async {
                while let Some(event) = rx.recv().await {
                    let wire = match event {
                        StreamEvent::Result(result) => WireEvent::Content {
                            content: result.output,
                        },
                        other => match WireEvent::try_from(other) {
                            Ok(wire) => wire,
                            Err(_) => continue,
                        },
                    };
                    print_frame(&wire)?;
                }
                Ok::<(), anyhow::Error>(())
            };
            let (outcome, printed) = tokio::join!(agent.execute_stream(&question, tx), printer);
            outcome?;
            printed?;
        } else {
            let result = agent.execute(&question).await?;
            println!("{}", result.output);
            eprintln!("{}", serde_json::to_string_pretty(&result.metadata)?);
        }
        return Ok(());
    }

    let coordinator = Coordinator::new(llm, retrieval, prompts, config.pipeline.clone());
    if cli.stream {
        let (tx, mut rx) = mpsc::channel(config.pipeline.stream_buffer);
        let printer = async {
            while let Some(event) = rx.recv().await {
                print_frame(&event)?;
            }
            Ok::<(), anyhow::Error>(())
        };
        let (outcome, printed) = tokio::join!(coordinator.execute_stream(&question, &[], tx), printer);
        outcome?;
        printed?;
    } else {
        let result = coordinator.execute(&question, &[]).await?;
        println!("{}", result.output);
        eprintln!("{}", serde_json::to_string_pretty(&result.metadata)?);
    }

    Ok(())
}

fn print_frame(event: &WireEvent) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(event.to_sse_frame()?.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
