//! grounded CLI
//!
//! Main entry point for the grounded command-line tool: ingest a corpus
//! into a vector collection and answer questions against it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand, StatsCommand};
use grounded_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// grounded - retrieval-augmented question answering over your documents
#[derive(Parser, Debug)]
#[command(name = "grounded")]
#[command(about = "Retrieval-augmented question answering over a pre-indexed corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "GROUNDED_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.grounded/config.yaml)
    #[arg(short, long, global = true, env = "GROUNDED_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Generative model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Vector collection name
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, segment, embed and index the corpus
    Ingest(IngestCommand),

    /// Answer a question from the indexed corpus
    Ask(AskCommand),

    /// Show collection statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // File and environment first, then CLI flags on top
    let config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        None,
        None,
        cli.model,
        cli.collection,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("grounded starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Collection: {}", config.vector_db.collection);
    tracing::debug!("Model: {}", config.llm.model);

    config.ensure_grounded_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
