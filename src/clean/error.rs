//! Errors raised while reconciling catalog entries.

use std::fmt;
use std::path::PathBuf;

use crate::model::EntryKind;

/// Step of a transactional removal that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalStage {
    /// Opening the transaction
    Begin,
    /// Deleting join/relationship rows that reference the entity
    Dependents,
    /// Deleting the entity row itself
    Entity,
    /// Committing the transaction
    Commit,
}

impl fmt::Display for RemovalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Begin => "begin",
            Self::Dependents => "dependent rows",
            Self::Entity => "entity row",
            Self::Commit => "commit",
        })
    }
}

/// Reconciliation error taxonomy.
///
/// Every variant is resolved at the task boundary: it is logged and reported
/// for its own entry, never propagated to sibling tasks.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    /// A root could not be compared against (treated as non-containing)
    #[error("Ambiguous containment against root {root:?}: {message}")]
    ClassificationAmbiguous { root: PathBuf, message: String },

    /// Reading the entry's current state failed
    #[error("Failed to look up {kind} {id}: {source}")]
    Lookup {
        kind: EntryKind,
        id: i64,
        #[source]
        source: sqlx::Error,
    },

    /// A store error inside the removal transaction (always rolled back)
    #[error("Failed to remove {kind} {id} ({stage}): {source}")]
    RemovalFailed {
        kind: EntryKind,
        id: i64,
        stage: RemovalStage,
        #[source]
        source: sqlx::Error,
    },

    /// The entity row disappeared before it could be deleted
    #[error("{kind} {id} no longer exists in the catalog")]
    EntityMissing { kind: EntryKind, id: i64 },

    /// A derived file could not be removed after a committed deletion
    #[error("Failed to remove artifact {path:?} of {kind} {id}: {source}")]
    ArtifactCleanupFailed {
        kind: EntryKind,
        id: i64,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A spawned task panicked or was cancelled
    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl CleanError {
    pub(crate) fn removal(
        kind: EntryKind,
        id: i64,
        stage: RemovalStage,
        source: sqlx::Error,
    ) -> Self {
        Self::RemovalFailed {
            kind,
            id,
            stage,
            source,
        }
    }

    /// True for errors raised by the removal transaction.
    pub fn is_removal_failure(&self) -> bool {
        matches!(
            self,
            Self::RemovalFailed { .. } | Self::EntityMissing { .. }
        )
    }
}
