// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;

use cvsense_rs::adk::cancel::CancellationFlag;
use cvsense_rs::cvsense::config::{AppConfig, ConfigLoader};
use cvsense_rs::cvsense::document::{FileTextExtractor, TextExtractor};
use cvsense_rs::cvsense::factory;
use cvsense_rs::cvsense::mapper::to_external;
use cvsense_rs::cvsense::rag::{KbDocument, KnowledgeBase, RetrievalAgent};
use cvsense_rs::cvsense::server;
use cvsense_rs::cvsense::store::InMemoryVectorStore;
use cvsense_rs::cvsense::workflow::{AnalysisRequest, WorkflowEngine};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract structured data from a CV
    Analyze {
        /// PDF, text or markdown file
        #[arg(short, long)]
        file: PathBuf,

        /// Job description file to align the candidate against
        #[arg(short, long)]
        job_description: Option<PathBuf>,
    },
    /// Answer a question from a set of documents
    Ask {
        /// Documents to index before answering
        #[arg(short, long, num_args = 1.., required = true)]
        docs: Vec<PathBuf>,

        #[arg(short, long)]
        query: String,
    },
    /// Start the HTTP server
    Serve {
        /// Overrides server.port from the config
        #[arg(short, long)]
        port: Option<u16>,
    },
}

async fn analyze(
    config: &AppConfig,
    file: PathBuf,
    job_description: Option<PathBuf>,
) -> anyhow::Result<()> {
    let client = factory::create_client(config)?;
    let engine = WorkflowEngine::new(
        client,
        config.workflow.clone(),
        Arc::new(FileTextExtractor::new()),
    );

    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let job_description = match job_description {
        Some(path) => Some(
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };

    let file_name = file.file_name().and_then(|n| n.to_str());
    let outcome = engine
        .run_document(&bytes, file_name, job_description, &CancellationFlag::new())
        .await?;

    let record = outcome.result.as_ref().map(to_external);
    let report = serde_json::json!({
        "outcome": outcome,
        "record": record,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn ask(config: &AppConfig, docs: Vec<PathBuf>, query: String) -> anyhow::Result<()> {
    let client = factory::create_client(config)?;
    let embedder = factory::create_embedder(&config.rag.embedding)?;
    let knowledge = Arc::new(KnowledgeBase::new(
        embedder,
        Arc::new(InMemoryVectorStore::new()),
        config.rag.chunk_chars,
    ));

    let extractor = FileTextExtractor::new();
    for path in docs {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let file_name = path.file_name().and_then(|n| n.to_str());
        let content = extractor.extract_text(&bytes, file_name)?;
        let report = knowledge
            .ingest(KbDocument {
                id: file_name.map(str::to_string),
                title: file_name.map(str::to_string),
                content,
            })
            .await?;
        log::info!("Indexed {} ({} chunks)", report.doc_id, report.chunks);
    }

    let agent = RetrievalAgent::new(client, knowledge, config.rag.clone());
    let answer = agent.run(&query, &CancellationFlag::new()).await;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();

    // one global logger: tracing (with the log bridge) for the server,
    // env_logger for one-shot commands
    if matches!(args.command, Commands::Serve { .. }) {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    } else {
        env_logger::init();
    }

    let mut config = ConfigLoader::load_or_default(args.config.as_deref())?;

    match args.command {
        Commands::Analyze {
            file,
            job_description,
        } => analyze(&config, file, job_description).await?,
        Commands::Ask { docs, query } => ask(&config, docs, query).await?,
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config).await?;
        }
    }

    Ok(())
}
