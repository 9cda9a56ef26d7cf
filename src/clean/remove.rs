//! Atomic removal of an entity and the rows that reference it.
//!
//! One removal is one transaction: dependent rows first, then the entity row,
//! then commit. Any failure rolls the whole transaction back, so an entry is
//! either fully present or fully gone. Only a successful commit counts as
//! [`DeletionOutcome::Committed`].

use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::Transaction;

use super::error::{CleanError, RemovalStage};
use crate::model::EntryKind;

/// Result of a transactional removal attempt.
#[derive(Debug)]
pub enum DeletionOutcome {
    Committed,
    Failed(CleanError),
}

impl DeletionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

/// Statements clearing every row that references an entity, in execution
/// order. Each binds the entity ID once.
fn dependent_statements(kind: EntryKind) -> &'static [&'static str] {
    match kind {
        EntryKind::Scene => &[
            "DELETE FROM scene_markers_tags WHERE scene_marker_id IN \
             (SELECT id FROM scene_markers WHERE scene_id = ?)",
            "DELETE FROM scene_markers WHERE scene_id = ?",
            "DELETE FROM performers_scenes WHERE scene_id = ?",
            "DELETE FROM scenes_tags WHERE scene_id = ?",
            "DELETE FROM movies_scenes WHERE scene_id = ?",
            // Galleries outlive the scene they were attached to
            "UPDATE galleries SET scene_id = NULL WHERE scene_id = ?",
        ],
        EntryKind::Gallery => &[
            "DELETE FROM galleries_tags WHERE gallery_id = ?",
            "DELETE FROM performers_galleries WHERE gallery_id = ?",
        ],
    }
}

fn entity_statement(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Scene => "DELETE FROM scenes WHERE id = ?",
        EntryKind::Gallery => "DELETE FROM galleries WHERE id = ?",
    }
}

/// Remove an entity and its dependent rows in a single transaction.
pub async fn remove(pool: &SqlitePool, kind: EntryKind, id: i64) -> DeletionOutcome {
    match destroy(pool, kind, id).await {
        Ok(()) => {
            tracing::debug!(target: "clean::remove", "Committed removal of {} {}", kind, id);
            DeletionOutcome::Committed
        }
        Err(e) => {
            tracing::info!(target: "clean::remove", "Error deleting {} {} from database: {}", kind, id, e);
            DeletionOutcome::Failed(e)
        }
    }
}

async fn destroy(pool: &SqlitePool, kind: EntryKind, id: i64) -> Result<(), CleanError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| CleanError::removal(kind, id, RemovalStage::Begin, e))?;

    if let Err(e) = delete_rows(&mut tx, kind, id).await {
        if let Err(rollback_err) = tx.rollback().await {
            tracing::warn!(target: "clean::remove", "Rollback of {} {} failed: {}", kind, id, rollback_err);
        }
        return Err(e);
    }

    tx.commit()
        .await
        .map_err(|e| CleanError::removal(kind, id, RemovalStage::Commit, e))
}

async fn delete_rows(
    tx: &mut Transaction<'_, Sqlite>,
    kind: EntryKind,
    id: i64,
) -> Result<(), CleanError> {
    for &sql in dependent_statements(kind) {
        sqlx::query(sql)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(|e| CleanError::removal(kind, id, RemovalStage::Dependents, e))?;
    }

    let result = sqlx::query(entity_statement(kind))
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(|e| CleanError::removal(kind, id, RemovalStage::Entity, e))?;

    if result.rows_affected() == 0 {
        return Err(CleanError::EntityMissing { kind, id });
    }

    Ok(())
}
