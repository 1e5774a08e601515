//! docbase CLI
//!
//! Main entry point for the docbase command-line tool: manage knowledge
//! bases, ingest sources and run similarity queries against them.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{AddCommand, BaseCommand, DeleteCommand, DocsCommand, QueryCommand};
use docbase_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// docbase - local knowledge bases with semantic search
#[derive(Parser, Debug)]
#[command(name = "docbase")]
#[command(about = "Local knowledge bases with semantic search", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCBASE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCBASE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Knowledge base management
    Base(BaseCommand),

    /// Add a file, URL, text or folder
    Add(AddCommand),

    /// Remove a source
    Delete(DeleteCommand),

    /// Query a knowledge base
    Query(QueryCommand),

    /// List the sources of a knowledge base
    Docs(DocsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Base(_) => "base",
            Commands::Add(_) => "add",
            Commands::Delete(_) => "delete",
            Commands::Query(_) => "query",
            Commands::Docs(_) => "docs",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()
        .context("failed to load configuration")?
        .with_overrides(
            cli.workspace,
            cli.config,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        )
        .reload_file()
        .context("failed to load configuration file")?;

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;
    config.rag.validate()?;

    tracing::info!("docbase starting");
    tracing::debug!("Workspace: {:?}", config.workspace);

    config.ensure_docbase_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match &cli.command {
        Commands::Base(cmd) => cmd.execute(&config).await,
        Commands::Add(cmd) => cmd.execute(&config).await,
        Commands::Delete(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::Docs(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.with_context(|| format!("{} failed", cli.command.name()))
}
