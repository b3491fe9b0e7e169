mod config;
mod interactive;
mod pipeline;

use anyhow::Result;
use clap::{Parser, Subcommand};
use graph::FusekiStore;
use query::QueryEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use pipeline::COMBINED_KNOWLEDGE_FILE;

#[derive(Parser)]
#[command(name = "kgraph", version, about = "Document to RDF knowledge graph with natural-language querying")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities and relations from every document in a directory.
    Process {
        #[arg(long)]
        docs_dir: Option<PathBuf>,

        /// Where the knowledge files are written.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Build the Turtle graph from a knowledge file.
    Build {
        /// Defaults to the combined knowledge file.
        #[arg(long)]
        input_file: Option<PathBuf>,

        #[arg(long)]
        graph_file: Option<PathBuf>,
    },

    /// Upload a Turtle graph to the triple store.
    Upload {
        #[arg(long)]
        graph_file: Option<PathBuf>,
    },

    /// Process, build and upload in one go.
    Pipeline {
        #[arg(long)]
        docs_dir: Option<PathBuf>,

        /// Where the knowledge files are written.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        graph_file: Option<PathBuf>,
    },

    /// Ask questions about the uploaded graph.
    Query {
        /// Answer a single question and exit instead of prompting.
        #[arg(long)]
        question: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn upload(config: &AppConfig, graph_file: &std::path::Path) -> Result<bool> {
    let store = FusekiStore::new(&config.store);
    let outcome = pipeline::upload(&store, graph_file).await?;

    if outcome.success {
        info!(status = outcome.status, url = store.data_url(), "Graph uploaded");
    } else {
        error!(status = outcome.status, body = %outcome.body, "Graph upload rejected");
    }
    Ok(outcome.success)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = AppConfig::load(cli.config.as_deref())?;
    pipeline::ensure_directories(&config)?;

    match cli.command {
        Commands::Process { docs_dir, output_dir } => {
            let docs_dir = docs_dir.unwrap_or_else(|| config.paths.docs_dir.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.paths.extracted_dir.clone());

            let knowledge = pipeline::process(
                &config,
                &docs_dir,
                &output_dir,
                pipeline::analyzer(&config.services),
                pipeline::encoder(&config.services),
            )
            .await?;

            println!(
                "Extracted {} entities and {} relations into {}",
                knowledge.entities.len(),
                knowledge.relations.len(),
                output_dir.display()
            );
        }

        Commands::Build { input_file, graph_file } => {
            let input_file = input_file.unwrap_or_else(|| config.combined_knowledge_file());
            let graph_file = graph_file.unwrap_or_else(|| config.paths.graph_file.clone());

            let graph = pipeline::build(&input_file, &graph_file)?;
            println!("Wrote {} triples to {}", graph.len(), graph_file.display());
        }

        Commands::Upload { graph_file } => {
            let graph_file = graph_file.unwrap_or_else(|| config.paths.graph_file.clone());
            if !upload(&config, &graph_file).await? {
                anyhow::bail!("upload of {} failed", graph_file.display());
            }
        }

        Commands::Pipeline { docs_dir, output_dir, graph_file } => {
            let docs_dir = docs_dir.unwrap_or_else(|| config.paths.docs_dir.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.paths.extracted_dir.clone());
            let graph_file = graph_file.unwrap_or_else(|| config.paths.graph_file.clone());

            let knowledge = pipeline::process(
                &config,
                &docs_dir,
                &output_dir,
                pipeline::analyzer(&config.services),
                pipeline::encoder(&config.services),
            )
            .await?;

            if knowledge.is_empty() {
                warn!(dir = %docs_dir.display(), "No knowledge extracted");
            }

            let graph = pipeline::build(&output_dir.join(COMBINED_KNOWLEDGE_FILE), &graph_file)?;
            info!(triples = graph.len(), file = %graph_file.display(), "Graph built");

            if !upload(&config, &graph_file).await? {
                anyhow::bail!("upload of {} failed", graph_file.display());
            }
            println!("Pipeline complete: {} triples uploaded", graph.len());
        }

        Commands::Query { question } => {
            let mut engine = QueryEngine::new(
                pipeline::analyzer(&config.services),
                pipeline::encoder(&config.services),
                Arc::new(FusekiStore::new(&config.store)),
            );

            match engine.refresh_labels().await {
                Ok(count) => info!(labels = count, "Ready"),
                Err(e) => warn!(error = %e, "Could not load labels; questions will report an empty graph"),
            }

            match question {
                Some(question) => interactive::answer_once(&engine, &question).await?,
                None => interactive::run(&engine).await?,
            }
        }
    }

    Ok(())
}
