//! Catalog reconciliation command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::watch;

use crate::clean::{BatchSummary, GeneratedFiles, LibraryRules, RunnerOptions, TaskRunner};
use crate::error::ResultExt;
use crate::{config, db};

/// Failure causes printed after the summary
const MAX_LISTED_FAILURES: usize = 10;

/// Reconcile every catalog entry against the library on disk.
pub fn cmd_clean(
    rt: &Runtime,
    config_path: Option<&Path>,
    db_path: Option<&Path>,
    concurrency: Option<usize>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let config = config::load(config_path).with_context("Failed to load config")?;

    let db_path = db_path
        .map(Path::to_path_buf)
        .or_else(|| config.storage.database_path());
    let generated = config
        .storage
        .generated_dir()
        .unwrap_or_else(|| PathBuf::from("generated"));
    let options = RunnerOptions {
        concurrency: concurrency.unwrap_or(config.clean.concurrency),
        dry_run,
    };

    let rules = LibraryRules::from_config(&config.library);

    rt.block_on(run_clean(db_path.as_deref(), rules, GeneratedFiles::new(generated), options))
}

async fn run_clean(
    db_path: Option<&Path>,
    rules: LibraryRules,
    generated: GeneratedFiles,
    options: RunnerOptions,
) -> anyhow::Result<()> {
    let dry_run = options.dry_run;
    let pool = db::open(db_path).await?;

    let entries = db::all_entries(&pool)
        .await
        .with_context("Failed to list catalog entries")?;
    if entries.is_empty() {
        println!("Catalog is empty, nothing to clean.");
        return Ok(());
    }

    // Ctrl-C stops new tasks; running ones finish their transaction
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing in-flight entries...");
            let _ = shutdown_tx.send(true);
        }
    });

    let runner = TaskRunner::new(pool.clone(), rules, Arc::new(generated))
        .with_options(options)
        .with_shutdown(shutdown_rx);

    let summary = runner.run_batch(entries).await;
    print_summary(&summary, dry_run);
    pool.close().await;

    if summary.failed() > 0 {
        anyhow::bail!("{} entries could not be cleaned", summary.failed());
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, dry_run: bool) {
    println!();
    if dry_run {
        println!("Clean Summary (dry run)");
    } else {
        println!("Clean Summary");
    }
    println!("=============");
    println!("Total entries: {}", summary.total());
    println!("  Kept:     {}", summary.kept());
    if dry_run {
        println!("  Flagged:  {}", summary.flagged());
    } else {
        println!("  Removed:  {}", summary.removed());
    }
    println!("  Failed:   {}", summary.failed());
    println!("  Skipped:  {}", summary.skipped());
    if summary.artifacts.entries > 0 {
        println!(
            "Artifacts: {} files removed, {} cleanup errors",
            summary.artifacts.files_removed, summary.artifacts.failures
        );
    }
    println!("Elapsed: {:.1?}", summary.elapsed);

    if dry_run && summary.flagged() > 0 {
        println!();
        println!("Would remove:");
        for report in summary.reports.iter() {
            if let crate::clean::TaskOutcome::Flagged(reason) = &report.outcome {
                println!("  {} [{}]", report.entry, reason);
            }
        }
    }

    let failed = summary.failed();
    if failed > 0 {
        println!();
        println!("Failures:");
        for (entry, error) in summary.failures().take(MAX_LISTED_FAILURES) {
            println!("  {} - {}", entry, error);
        }
        if failed > MAX_LISTED_FAILURES {
            println!("  ... and {} more", failed - MAX_LISTED_FAILURES);
        }
    }
}
