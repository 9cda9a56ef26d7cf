//! Catalog reconciliation: find tracked entries whose files are gone or out
//! of scope, and remove them.
//!
//! # Overview
//!
//! - [`classify`]: decides Keep or Delete for a path (existence, library
//!   roots, exclusion patterns)
//! - [`remove`]: deletes an entity and its dependent rows in one transaction
//! - [`artifacts`]: removes generated files once a deletion has committed
//! - [`task`]: one entry's classify, remove, clean up cycle
//! - [`runner`]: concurrent fan-out over a batch with a per-entry summary
//!
//! # Example
//!
//! ```ignore
//! use catalog_janitor::clean::{GeneratedFiles, LibraryRules, TaskRunner};
//!
//! let rules = LibraryRules::from_config(&config.library);
//! let runner = TaskRunner::new(pool.clone(), rules, Arc::new(GeneratedFiles::new(dir)));
//! let summary = runner.run_batch(db::all_entries(&pool).await?).await;
//! println!("{} removed, {} failed", summary.removed(), summary.failed());
//! ```

pub mod artifacts;
pub mod classify;
mod error;
pub mod remove;
pub mod runner;
pub mod task;

pub use artifacts::{ArtifactCleaner, CleanupQueue, CleanupStats, CleanupWorker, GeneratedFiles};
pub use classify::{Exclusions, LibraryRules, StaleReason, Verdict};
pub use error::{CleanError, RemovalStage};
pub use remove::{DeletionOutcome, remove};
pub use runner::{BatchSummary, EntryReport, RunnerOptions, TaskRunner};
pub use task::{ReconciliationTask, SkipReason, TaskOutcome};
