//! Jasper Getter CLI - Main Entry Point
//!
//! Runs SIM lookups and manages portal sessions without the HTTP server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{query, session};
use jasper_common::{ConfigStore, GetterConfig};
use jasper_portal::SimDataService;

/// Jasper Getter CLI - SIM card lookups against a Jasper-style control center
#[derive(Parser)]
#[command(name = "jasper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "JASPER_CONFIG", default_value = "jasper.toml", global = true)]
    config: PathBuf,

    /// Directory holding accounts, templates and session documents
    #[arg(long, env = "JASPER_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one SIM card by ICCID or VIN
    Query(query::QueryArgs),

    /// Log in again and replace the cached session of a project
    Refresh {
        /// Project to log in
        project: String,
    },

    /// List cached sessions
    Session,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = GetterConfig::load(&cli.config)?;
    if let Some(dir) = cli.config_dir {
        config.config_dir = dir;
    }

    let result = match cli.command {
        Commands::Query(args) => {
            query::execute(args, SimDataService::from_config(&config)?, cli.format).await
        }
        Commands::Refresh { project } => {
            session::refresh(SimDataService::from_config(&config)?, &project, cli.format).await
        }
        Commands::Session => session::list(&ConfigStore::new(&config.config_dir), cli.format),
        Commands::Version => {
            println!("Jasper Getter CLI v{}", jasper_common::VERSION);
            Ok(())
        }
    };

    if let Err(e) = result {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }

    Ok(())
}
