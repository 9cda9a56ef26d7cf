//! Command-line interface for catalog-janitor.
//!
//! This module provides CLI commands for reconciling the catalog against
//! the library on disk and for writing a starter config file.

mod commands;

pub use commands::{Cli, Commands, run_command};
