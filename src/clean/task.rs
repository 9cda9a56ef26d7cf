//! One entry's check-and-act cycle.
//!
//! ```text
//! Start -> Classified -> Kept
//!                     -> Removed        (commit succeeded, artifacts queued)
//!                     -> Failed         (rolled back, entry unchanged)
//!                     -> Flagged        (dry run)
//! Start -> Skipped                      (shutdown, or row already gone)
//! ```
//!
//! Steps run strictly in sequence and are never retried within a pass; a
//! failed entry is simply reconsidered by the next pass.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::watch;

use super::artifacts::CleanupQueue;
use super::classify::{LibraryRules, StaleReason, Verdict};
use super::error::CleanError;
use super::remove::{DeletionOutcome, remove};
use crate::db;
use crate::model::LibraryEntry;

/// Why a task ended without classifying its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Shutdown was requested before the task started
    Shutdown,
    /// The entry no longer exists in the catalog
    NotInStore,
    /// Another task in the same batch owns this entry
    Duplicate,
}

/// Terminal state of a reconciliation task.
#[derive(Debug)]
pub enum TaskOutcome {
    Kept,
    Removed(StaleReason),
    /// Would have been removed, but the pass is a dry run
    Flagged(StaleReason),
    Failed(CleanError),
    Skipped(SkipReason),
}

impl TaskOutcome {
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed(_))
    }

    pub fn error(&self) -> Option<&CleanError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Reconciles single entries against the catalog and the filesystem.
///
/// Holds only shared, read-only state, so one instance can serve every task
/// of a batch concurrently.
pub struct ReconciliationTask {
    pool: SqlitePool,
    rules: Arc<LibraryRules>,
    cleanup: CleanupQueue,
    dry_run: bool,
    shutdown: watch::Receiver<bool>,
}

impl ReconciliationTask {
    pub fn new(pool: SqlitePool, rules: Arc<LibraryRules>, cleanup: CleanupQueue) -> Self {
        // The sender is dropped right away, so shutdown is never signalled
        let (_, shutdown) = watch::channel(false);
        Self {
            pool,
            rules,
            cleanup,
            dry_run: false,
            shutdown,
        }
    }

    /// Classify only; never remove anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Observe a shutdown flag; `true` makes tasks that have not started skip.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run the full cycle for one entry.
    pub async fn run(&self, entry: &LibraryEntry) -> TaskOutcome {
        if self.shutdown_requested() {
            return TaskOutcome::Skipped(SkipReason::Shutdown);
        }

        // Decide on the latest committed state, not the caller's copy
        let current = match db::find_entry(&self.pool, entry.kind, entry.id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                tracing::debug!(target: "clean", "{} is no longer in the catalog", entry);
                return TaskOutcome::Skipped(SkipReason::NotInStore);
            }
            Err(source) => {
                return TaskOutcome::Failed(CleanError::Lookup {
                    kind: entry.kind,
                    id: entry.id,
                    source,
                });
            }
        };

        let reason = match self.classify(&current).await {
            Ok(Verdict::Keep) => {
                tracing::debug!(target: "clean", "Keeping {}", current);
                return TaskOutcome::Kept;
            }
            Ok(Verdict::Delete(reason)) => reason,
            Err(e) => return TaskOutcome::Failed(e),
        };

        if self.dry_run {
            tracing::info!(target: "clean", "Would clean {} ({}): \"{}\"", current.kind, reason, current.path);
            return TaskOutcome::Flagged(reason);
        }

        tracing::info!(target: "clean", "Cleaning {} {} ({}): \"{}\"", current.kind, current.id, reason, current.path);

        match remove(&self.pool, current.kind, current.id).await {
            DeletionOutcome::Committed => {
                self.cleanup.submit(current);
                TaskOutcome::Removed(reason)
            }
            DeletionOutcome::Failed(e) => TaskOutcome::Failed(e),
        }
    }

    /// Run classification on the blocking pool; it stats the file.
    async fn classify(&self, entry: &LibraryEntry) -> Result<Verdict, CleanError> {
        let rules = Arc::clone(&self.rules);
        let path = entry.path_buf();

        tokio::task::spawn_blocking(move || rules.classify(&path))
            .await
            .map_err(|e| CleanError::TaskJoin(e.to_string()))
    }
}
