//! Test utilities and fixtures for catalog-janitor tests.
//!
//! This module provides a temporary catalog database, entry seeding with
//! dependent rows, library trees on disk, and mock artifact cleaners.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_db, insert_scene, seed_scene_dependents};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let entry = insert_scene(&pool, 8, "/lib/a/old.mp4").await;
//!     seed_scene_dependents(&pool, 8).await;
//!     // ... test logic
//! }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::clean::{ArtifactCleaner, CleanError};
use crate::model::{EntryKind, LibraryEntry};

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Creates `<tmp>/lib/a` and returns (temp dir handle, root path).
pub fn library_tree() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let root = dir.path().join("lib").join("a");
    std::fs::create_dir_all(&root).expect("Failed to create library root");
    (dir, root)
}

/// Creates a small file (and its parent directories).
pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::write(path, b"data").expect("Failed to write file");
}

/// Inserts a scene with an explicit ID and returns it as an entry.
pub async fn insert_scene(pool: &SqlitePool, id: i64, path: &str) -> LibraryEntry {
    insert_entry(pool, EntryKind::Scene, id, path).await
}

/// Inserts a gallery with an explicit ID and returns it as an entry.
pub async fn insert_gallery(pool: &SqlitePool, id: i64, path: &str) -> LibraryEntry {
    insert_entry(pool, EntryKind::Gallery, id, path).await
}

async fn insert_entry(pool: &SqlitePool, kind: EntryKind, id: i64, path: &str) -> LibraryEntry {
    let checksum = format!("checksum-{}-{}", kind, id);
    let sql = format!(
        "INSERT INTO {} (id, path, checksum, title) VALUES (?, ?, ?, ?)",
        kind.table()
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(path)
        .bind(&checksum)
        .bind(format!("{} {}", kind, id))
        .execute(pool)
        .await
        .expect("Failed to insert entry");

    LibraryEntry::new(kind, id, path, checksum)
}

async fn insert_named(pool: &SqlitePool, table: &str, column: &str, name: &str) -> i64 {
    let sql = format!("INSERT INTO {table} ({column}) VALUES (?)");
    sqlx::query(&sql)
        .bind(name)
        .execute(pool)
        .await
        .expect("Failed to insert row")
        .last_insert_rowid()
}

/// Gives a scene one marker (with a marker tag), one performer link, one tag
/// link and one movie link: five dependent rows.
pub async fn seed_scene_dependents(pool: &SqlitePool, scene_id: i64) {
    let tag = insert_named(pool, "tags", "name", &format!("tag-scene-{scene_id}")).await;
    let performer = insert_named(pool, "performers", "name", &format!("performer-{scene_id}")).await;
    let movie = insert_named(pool, "movies", "name", &format!("movie-{scene_id}")).await;

    let marker = sqlx::query(
        "INSERT INTO scene_markers (title, seconds, primary_tag_id, scene_id) VALUES ('intro', 12.0, ?, ?)",
    )
    .bind(tag)
    .bind(scene_id)
    .execute(pool)
    .await
    .expect("Failed to insert marker")
    .last_insert_rowid();

    let links = [
        ("INSERT INTO scene_markers_tags (scene_marker_id, tag_id) VALUES (?, ?)", marker, tag),
        ("INSERT INTO performers_scenes (performer_id, scene_id) VALUES (?, ?)", performer, scene_id),
        ("INSERT INTO scenes_tags (scene_id, tag_id) VALUES (?, ?)", scene_id, tag),
        ("INSERT INTO movies_scenes (movie_id, scene_id) VALUES (?, ?)", movie, scene_id),
    ];
    for (sql, a, b) in links {
        sqlx::query(sql)
            .bind(a)
            .bind(b)
            .execute(pool)
            .await
            .expect("Failed to insert join row");
    }
}

/// Gives a gallery one tag link and one performer link.
pub async fn seed_gallery_dependents(pool: &SqlitePool, gallery_id: i64) {
    let tag = insert_named(pool, "tags", "name", &format!("tag-gallery-{gallery_id}")).await;
    let performer = insert_named(pool, "performers", "name", &format!("gallery-performer-{gallery_id}")).await;

    sqlx::query("INSERT INTO galleries_tags (gallery_id, tag_id) VALUES (?, ?)")
        .bind(gallery_id)
        .bind(tag)
        .execute(pool)
        .await
        .expect("Failed to insert gallery tag");
    sqlx::query("INSERT INTO performers_galleries (performer_id, gallery_id) VALUES (?, ?)")
        .bind(performer)
        .bind(gallery_id)
        .execute(pool)
        .await
        .expect("Failed to insert gallery performer");
}

/// Rows referencing one scene, by table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DependentCounts {
    pub markers: i64,
    pub marker_tags: i64,
    pub performers: i64,
    pub tags: i64,
    pub movies: i64,
}

impl DependentCounts {
    pub fn total(&self) -> i64 {
        self.markers + self.marker_tags + self.performers + self.tags + self.movies
    }
}

/// Counts the dependent rows of a scene.
pub async fn dependent_counts(pool: &SqlitePool, scene_id: i64) -> DependentCounts {
    let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM scene_markers WHERE scene_id = ?1),
            (SELECT COUNT(*) FROM scene_markers_tags smt
                JOIN scene_markers sm ON sm.id = smt.scene_marker_id
                WHERE sm.scene_id = ?1),
            (SELECT COUNT(*) FROM performers_scenes WHERE scene_id = ?1),
            (SELECT COUNT(*) FROM scenes_tags WHERE scene_id = ?1),
            (SELECT COUNT(*) FROM movies_scenes WHERE scene_id = ?1)
        "#,
    )
    .bind(scene_id)
    .fetch_one(pool)
    .await
    .expect("Failed to count dependents");

    DependentCounts {
        markers: row.0,
        marker_tags: row.1,
        performers: row.2,
        tags: row.3,
        movies: row.4,
    }
}

/// Installs a trigger that aborts deletion of one entity row, so removal
/// fails after its dependent rows were already deleted in the transaction.
pub async fn block_entity_delete(pool: &SqlitePool, kind: EntryKind, id: i64) {
    let sql = format!(
        "CREATE TRIGGER block_{kind}_{id} BEFORE DELETE ON {table} \
         WHEN OLD.id = {id} BEGIN SELECT RAISE(ABORT, '{kind} {id} is locked'); END",
        table = kind.table()
    );
    sqlx::query(&sql)
        .execute(pool)
        .await
        .expect("Failed to create trigger");
}

/// Adds a row referencing the scene through a deferred foreign key, so a
/// removal passes every statement and only fails at commit.
pub async fn defer_scene_reference(pool: &SqlitePool, scene_id: i64) {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS scene_notes (\
            scene_id INTEGER NOT NULL REFERENCES scenes(id) DEFERRABLE INITIALLY DEFERRED\
        )",
    )
    .execute(pool)
    .await
    .expect("Failed to create deferred table");
    sqlx::query("INSERT INTO scene_notes (scene_id) VALUES (?)")
        .bind(scene_id)
        .execute(pool)
        .await
        .expect("Failed to insert deferred reference");
}

/// Cleaner that records which entries it was asked to clean.
#[derive(Default)]
pub struct RecordingCleaner {
    seen: Mutex<Vec<LibraryEntry>>,
}

impl RecordingCleaner {
    pub fn ids(&self) -> Vec<i64> {
        self.seen.lock().iter().map(|e| e.id).collect()
    }
}

#[async_trait]
impl ArtifactCleaner for RecordingCleaner {
    async fn remove_artifacts(&self, entry: &LibraryEntry) -> Result<usize, CleanError> {
        self.seen.lock().push(entry.clone());
        Ok(1)
    }
}

/// Cleaner that always fails.
pub struct FailingCleaner;

#[async_trait]
impl ArtifactCleaner for FailingCleaner {
    async fn remove_artifacts(&self, entry: &LibraryEntry) -> Result<usize, CleanError> {
        Err(CleanError::ArtifactCleanupFailed {
            kind: entry.kind,
            id: entry.id,
            path: PathBuf::from("/generated/screenshots"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;

        let entries = crate::db::all_entries(&pool).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_seed_scene_dependents() {
        let (pool, _dir) = temp_db().await;
        insert_scene(&pool, 3, "/lib/a/x.mp4").await;
        seed_scene_dependents(&pool, 3).await;

        let counts = dependent_counts(&pool, 3).await;
        assert_eq!(
            counts,
            DependentCounts {
                markers: 1,
                marker_tags: 1,
                performers: 1,
                tags: 1,
                movies: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let (pool, _dir) = temp_db().await;
        insert_scene(&pool, 3, "/lib/a/x.mp4").await;
        seed_scene_dependents(&pool, 3).await;

        // Deleting the entity before its dependents must fail
        let result = sqlx::query("DELETE FROM scenes WHERE id = 3")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_library_tree() {
        let (_dir, root) = library_tree();
        assert!(root.is_dir());
        assert!(root.ends_with("lib/a"));
    }
}
