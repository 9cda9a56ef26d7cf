//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `clean`: Catalog reconciliation
//! - `config`: Config file bootstrap

mod clean;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

pub use clean::cmd_clean;
pub use config::cmd_init_config;

/// Catalog Janitor CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: the OS config directory)
    #[arg(long, global = true, env = "CATALOG_JANITOR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Remove catalog entries whose files are missing, outside the library
    /// roots, or excluded
    Clean {
        /// Dry run - report what would be removed without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Database path (overrides the config file)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Maximum entries reconciled at once (overrides the config file)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },
    /// Write a default config file if none exists
    InitConfig,
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    match &cli.command {
        Commands::Clean {
            dry_run,
            db,
            concurrency,
        } => {
            let rt = Runtime::new()?;
            cmd_clean(&rt, config_path, db.as_deref(), *concurrency, *dry_run)
        }
        Commands::InitConfig => cmd_init_config(config_path),
    }
}
