// src/bin/anima.rs
use std::path::PathBuf;
use std::sync::Arc;

use anima_agent::telemetry::init_tracing;
use anima_agent::{Observation, Settings, ToolRegistry, TurnOrchestrator};
use anima_core::store::{DocumentStore, SqliteDocumentStore};
use anima_core::{EmbeddingService, IndexKind};
use anima_llm::{CompletionService, LlmClient, OpenAiEmbeddingClient, PromptEngine};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "anima", version, about = "Run NPC turns and maintain their memory indices")]
struct Args {
    /// Settings file (TOML); ANIMA__* environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one turn for an NPC and print the result as JSON
    RunTurn {
        /// NPC id
        #[arg(long)]
        npc: String,
        /// JSON file holding the observation
        #[arg(long)]
        observation: PathBuf,
    },
    /// Show what an NPC recalls for a query
    Retrieve {
        /// NPC id
        #[arg(long)]
        npc: String,
        /// Query text
        #[arg(long)]
        query: String,
        /// Hits per index (defaults to the NPC's setting)
        #[arg(long)]
        k: Option<usize>,
    },
    /// Rebuild an index from the document store
    Reindex {
        /// episodic, persona or world
        #[arg(long)]
        index: IndexKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs);

    let config = Settings::load(args.config.as_deref()).context("loading settings")?;

    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteDocumentStore::open(&config.storage.database_path, config.storage.wal_mode)
            .context("opening document store")?,
    );
    let embedder: Arc<dyn EmbeddingService> = Arc::new(
        OpenAiEmbeddingClient::from_config(&config.embedding, &config.llm).context("building embedding client")?,
    );
    let llm: Arc<dyn CompletionService> =
        Arc::new(LlmClient::from_config(&config.llm).context("building completion client")?);
    let prompts = match &config.prompt.template_dir {
        Some(dir) => PromptEngine::from_directory(dir).context("loading prompt templates")?,
        None => PromptEngine::builtin(),
    };
    let tools = Arc::new(ToolRegistry::with_builtins());

    let orchestrator =
        TurnOrchestrator::new(config, store, embedder, llm, tools).with_prompts(Arc::new(prompts));

    match args.command {
        Command::RunTurn { npc, observation } => {
            let raw = std::fs::read_to_string(&observation)
                .with_context(|| format!("reading {}", observation.display()))?;
            let observation: Observation = serde_json::from_str(&raw).context("parsing observation")?;
            let result = orchestrator.run_turn(&npc, &observation).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Retrieve { npc, query, k } => {
            let outcome = orchestrator.retrieve_for_npc(&npc, &query, k).await?;
            for (rank, hit) in outcome.results.iter().enumerate() {
                println!(
                    "{}\t{:.4}\t{}\t{}\t{}",
                    rank + 1,
                    hit.score(),
                    hit.index,
                    hit.record.source_type,
                    hit.record.summary
                );
            }
        }
        Command::Reindex { index } => {
            let written = orchestrator.reindex(index).await?;
            println!("{index}: {written} vectors");
        }
    }
    Ok(())
}
