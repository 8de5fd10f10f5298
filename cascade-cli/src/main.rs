//! cascade-catalog - Browse, preview and download Cascade customizations
//!
//! Reads the catalog from a published site or a local checkout and prints
//! results to stdout. Logs always go to stderr.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod catalog_cli;

use catalog_cli::{CatalogSubcommand, SourceArgs};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "cascade-catalog",
    about = "Browse, preview and download Cascade rules, workflows and team bundles",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: CatalogSubcommand,

    /// Catalog location: site URL or local checkout directory
    #[clap(long, short, default_value = ".", global = true)]
    source: String,

    /// URL the catalog page is served from (selects the deployment mode)
    #[clap(long, global = true)]
    page_url: Option<String>,

    /// Override configuration file path
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,
}

fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr) // stdout carries command output
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);

    let source = SourceArgs {
        source: cli.source,
        page_url: cli.page_url,
        config: cli.config,
    };

    cli.command.execute(&source).await
}
