//! Concurrent fan-out of reconciliation tasks over a batch of entries.
//!
//! The runner owns no reconciliation logic. It spawns one task per entry,
//! bounds how many run at once, waits for every one of them, and collects
//! the per-entry outcomes into a [`BatchSummary`].
//!
//! # Usage
//!
//! ```ignore
//! let runner = TaskRunner::new(pool, rules, Arc::new(GeneratedFiles::new(dir)))
//!     .with_options(RunnerOptions { concurrency: 8, dry_run: false })
//!     .with_shutdown(shutdown_rx);
//! let summary = runner.run_batch(db::all_entries(&pool).await?).await;
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::SqlitePool;
use tokio::sync::{Semaphore, watch};

use super::artifacts::{ArtifactCleaner, CleanupStats, CleanupWorker};
use super::classify::LibraryRules;
use super::error::CleanError;
use super::task::{ReconciliationTask, SkipReason, TaskOutcome};
use crate::model::LibraryEntry;

/// Default number of tasks allowed to run at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Tuning for one batch.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Maximum tasks in flight (at least 1)
    pub concurrency: usize,
    /// Classify only; report what would be removed
    pub dry_run: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
        }
    }
}

/// Outcome of one entry in a batch.
#[derive(Debug)]
pub struct EntryReport {
    pub entry: LibraryEntry,
    pub outcome: TaskOutcome,
}

/// Per-entry results of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<EntryReport>,
    /// Totals from the post-commit artifact cleanup
    pub artifacts: CleanupStats,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn count(&self, pred: impl Fn(&TaskOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn kept(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Kept))
    }

    pub fn removed(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Removed(_)))
    }

    pub fn flagged(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Flagged(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Skipped(_)))
    }

    /// Entries whose task failed, with the cause.
    pub fn failures(&self) -> impl Iterator<Item = (&LibraryEntry, &CleanError)> {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.error().map(|e| (&r.entry, e)))
    }
}

/// Runs reconciliation tasks for a batch of entries concurrently.
pub struct TaskRunner {
    pool: SqlitePool,
    rules: Arc<LibraryRules>,
    cleaner: Arc<dyn ArtifactCleaner>,
    options: RunnerOptions,
    shutdown: Option<watch::Receiver<bool>>,
}

impl TaskRunner {
    pub fn new(pool: SqlitePool, rules: LibraryRules, cleaner: Arc<dyn ArtifactCleaner>) -> Self {
        Self {
            pool,
            rules: Arc::new(rules),
            cleaner,
            options: RunnerOptions::default(),
            shutdown: None,
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Tasks that have not started when the flag turns `true` are skipped;
    /// tasks already running finish their transaction.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Reconcile every entry and wait until all of them are terminal.
    ///
    /// Individual failures are reported per entry; the batch itself never fails.
    pub async fn run_batch(&self, entries: Vec<LibraryEntry>) -> BatchSummary {
        let started = Instant::now();

        if self.rules.roots().is_empty() {
            tracing::warn!(target: "clean", "No library roots configured; every tracked file is out of scope");
        }
        tracing::info!(
            target: "clean",
            "Reconciling {} entries ({} roots, {} exclusions{})",
            entries.len(),
            self.rules.roots().len(),
            self.rules.exclusions().len(),
            if self.options.dry_run { ", dry run" } else { "" }
        );

        let (queue, worker) = CleanupWorker::spawn(Arc::clone(&self.cleaner));
        let mut task = ReconciliationTask::new(self.pool.clone(), Arc::clone(&self.rules), queue)
            .dry_run(self.options.dry_run);
        if let Some(shutdown) = &self.shutdown {
            task = task.with_shutdown(shutdown.clone());
        }
        let task = Arc::new(task);
        let permits = Arc::new(Semaphore::new(self.options.concurrency.max(1)));

        // Spawned tasks keep running if this future is dropped, so an
        // in-flight transaction always reaches commit or rollback.
        // Each (kind, id) gets one owning task; repeats are reported as skipped.
        let mut owned = HashSet::new();
        let handles: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                if !owned.insert((entry.kind, entry.id)) {
                    return (entry, None);
                }
                let task = Arc::clone(&task);
                let permits = Arc::clone(&permits);
                let target = entry.clone();
                let handle = tokio::spawn(async move {
                    let _permit = match permits.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return TaskOutcome::Failed(CleanError::TaskJoin(e.to_string())),
                    };
                    task.run(&target).await
                });
                (entry, Some(handle))
            })
            .collect();
        drop(task);

        let mut reports = Vec::with_capacity(handles.len());
        for (entry, handle) in handles {
            let outcome = match handle {
                Some(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => TaskOutcome::Failed(CleanError::TaskJoin(e.to_string())),
                },
                None => {
                    tracing::debug!(target: "clean", "{} appears more than once in the batch", entry);
                    TaskOutcome::Skipped(SkipReason::Duplicate)
                }
            };
            if let TaskOutcome::Failed(e) = &outcome {
                tracing::warn!(target: "clean", "{}: {}", entry, e);
            }
            reports.push(EntryReport { entry, outcome });
        }

        // Every task has dropped its queue handle; drain what they submitted
        let artifacts = worker.finish().await;

        let summary = BatchSummary {
            reports,
            artifacts,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            target: "clean",
            "Finished in {:.1?}: {} kept, {} removed, {} flagged, {} failed, {} skipped",
            summary.elapsed,
            summary.kept(),
            summary.removed(),
            summary.flagged(),
            summary.failed(),
            summary.skipped()
        );

        summary
    }
}
