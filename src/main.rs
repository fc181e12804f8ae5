//! # kinderchat CLI
//!
//! The `kinderchat` binary starts the chat server and offers two
//! retrieval-only commands for inspecting the corpus without calling
//! the generator.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kinderchat serve` | Load the corpus eagerly and start the chat HTTP server |
//! | `kinderchat search "<query>"` | Print the context excerpt assembled for a query |
//! | `kinderchat docs` | List the loaded documents |
//!
//! All commands accept a `--config` flag pointing to a TOML
//! configuration file; API keys are read from the environment (a
//! `.env` file is honored).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kinderchat::config::load_config;
use kinderchat::corpus::CorpusProvider;
use kinderchat::generate::GeminiGenerator;
use kinderchat::search;
use kinderchat::server;

/// kinderchat — a document-grounded chat assistant for kindergarten
/// parents.
#[derive(Parser)]
#[command(
    name = "kinderchat",
    about = "Document-grounded chat assistant for kindergarten parents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kinderchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat HTTP server.
    ///
    /// Loads and indexes the document corpus up front, then serves
    /// `/api/chat` and `/api/tts` until the process is terminated.
    Serve,

    /// Print the context excerpt assembled for a query.
    ///
    /// Runs the full retrieval pipeline (load → rank → assemble)
    /// without calling the generator. Useful for checking what the
    /// model would be grounded on.
    Search {
        /// The question to search the corpus with.
        query: String,
    },

    /// List the loaded documents.
    Docs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli.config)?);
    let provider = Arc::new(CorpusProvider::new(config.clone()));

    match cli.command {
        Commands::Serve => {
            provider.warm().await?;
            let generator = Arc::new(GeminiGenerator::new(config.generator.clone()));
            server::run_server(config, provider, generator).await
        }
        Commands::Search { query } => {
            let corpus = provider.get().await?;
            let context = search::search(&query, &corpus, &config.search_params());
            if context.is_empty() {
                println!("(no grounding context found)");
            } else {
                println!("{}", context);
            }
            Ok(())
        }
        Commands::Docs => {
            let corpus = provider.get().await?;
            println!("{} documents loaded", corpus.len());
            for doc in corpus.documents() {
                println!(
                    "  {} — {} ({} chars)",
                    doc.filename,
                    doc.title,
                    doc.content.chars().count()
                );
            }
            Ok(())
        }
    }
}
