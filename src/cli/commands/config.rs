//! Config file bootstrap command.

use anyhow::Context;
use std::path::Path;

use crate::config::{self, Config};

/// Write the default config unless a file is already there.
pub fn cmd_init_config(path: Option<&Path>) -> anyhow::Result<()> {
    let target = match path {
        Some(p) => p.to_path_buf(),
        None => config::config_path().context("Could not determine config directory")?,
    };

    if target.exists() {
        println!("Config already exists at {}", target.display());
        return Ok(());
    }

    let written = config::save(&Config::default(), Some(&target))?;
    println!("Wrote default config to {}", written.display());
    println!("Add your library roots under [library] before running `clean`.");
    Ok(())
}
