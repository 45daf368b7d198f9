//! SourceFinder CLI
//!
//! Runs the search pipeline from the terminal against an in-memory store.
//! History lasts for the session only.

mod cli;
mod render;

use anyhow::Context;
use clap::Parser;
use sourcefinder_common::{
    config::{AppConfig, ProbeMode},
    db::{MemoryStore, SearchStore},
    errors::AppError,
    llm::create_llm_client,
    pipeline::{SearchPipeline, MIN_TOPIC_CHARS},
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const EXIT_COMMANDS: [&str; 3] = ["sair", "exit", "quit"];
const HISTORY_COMMAND: &str = "historico";

/// What one line typed at the prompt asks for
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    History,
    Empty,
    Search(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    let lowered = trimmed.to_lowercase();

    if trimmed.is_empty() {
        Input::Empty
    } else if EXIT_COMMANDS.contains(&lowered.as_str()) {
        Input::Exit
    } else if lowered == HISTORY_COMMAND || lowered == "histórico" {
        Input::History
    } else {
        Input::Search(trimmed)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = cli::Cli::parse();

    // Logs go to stderr so they never interleave with results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(&path.to_string_lossy()),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    if cli.probe {
        config.probe.mode = ProbeMode::Annotate;
        config.probe.want_pdf_check = cli.pdf;
    }

    let llm = match create_llm_client(&config.llm) {
        Ok(llm) => llm,
        Err(AppError::Configuration { message }) => {
            anyhow::bail!("{}", message);
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(model = llm.model_name(), "SourceFinder CLI starting");

    let store: Arc<dyn SearchStore> = Arc::new(MemoryStore::new());
    let pipeline = SearchPipeline::from_config(&config, llm, store)?;

    match cli.topic.as_deref() {
        Some(topic) => search(&pipeline, topic).await,
        None => interactive(&pipeline).await,
    }
}

async fn search(pipeline: &SearchPipeline, topic: &str) -> anyhow::Result<()> {
    println!("Pesquisando fontes sobre '{}'...", topic.trim());
    let run = pipeline.run_search(topic).await?;
    print!("{}", render::render_run(&run));
    Ok(())
}

async fn interactive(pipeline: &SearchPipeline) -> anyhow::Result<()> {
    println!("SourceFinder v{}", sourcefinder_common::VERSION);
    println!(
        "Digite um tema para pesquisar, '{}' para ver as pesquisas da sessão ou 'sair' para encerrar.",
        HISTORY_COMMAND
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nTema: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match classify(&line) {
            Input::Exit => break,
            Input::Empty => continue,
            Input::History => {
                let history = pipeline.store().list_searches().await?;
                print!("{}", render::render_history(&history));
            }
            Input::Search(topic) => match search(pipeline, topic).await {
                Ok(()) => {}
                Err(e) => match e.downcast_ref::<AppError>() {
                    Some(AppError::Validation { .. }) => println!(
                        "O tema deve ter pelo menos {} caracteres. Tente algo mais específico.",
                        MIN_TOPIC_CHARS
                    ),
                    _ => eprintln!("Erro: {:#}", e),
                },
            },
        }
    }

    println!("Até logo!");
    Ok(())
}
