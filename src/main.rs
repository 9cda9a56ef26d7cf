//! Catalog Janitor command-line entry point.

use catalog_janitor::cli;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Used when RUST_LOG is unset; reconciliation logs under the "clean" targets
const DEFAULT_LOG_FILTER: &str = "catalog_janitor=info,clean=info";

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    cli::run_command(&args)
}

/// RUST_LOG replaces the defaults entirely when set.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(DEFAULT_LOG_FILTER),
    }
}
