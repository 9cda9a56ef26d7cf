//! Database module for the media catalog.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Provides async operations for:
//! - Pool initialisation and migrations
//! - Looking up an entry's latest committed state by ID
//! - Enumerating every tracked entry for a reconciliation pass
//!
//! Deletions live in [`crate::clean::remove`], which owns the transaction
//! boundaries.
//!
//! # Example
//!
//! ```ignore
//! use catalog_janitor::db::{init_db, all_entries};
//!
//! let pool = init_db("sqlite:catalog.db").await?;
//! let entries = all_entries(&pool).await?;
//! ```

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::ResultExt;
use crate::model::{EntryKind, LibraryEntry};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "catalog.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
/// SQLx enables foreign key enforcement on every SQLite connection.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Open the catalog at `path` (or [`DEFAULT_DB_NAME`]), naming the URL in
/// any error.
pub async fn open(path: Option<&std::path::Path>) -> crate::error::Result<SqlitePool> {
    let url = db_url(path);
    init_db(&url)
        .await
        .with_context(format!("Failed to open database {}", url))
}

/// Row shape shared by every path-backed entity table.
#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    path: String,
    checksum: String,
}

impl EntryRow {
    fn into_entry(self, kind: EntryKind) -> LibraryEntry {
        LibraryEntry {
            id: self.id,
            kind,
            path: self.path,
            checksum: self.checksum,
        }
    }
}

/// Get an entry by kind and ID.
///
/// Always reads through the pool, so the result reflects the latest
/// committed state.
///
/// # Returns
///
/// The entry if found, or None.
pub async fn find_entry(
    pool: &SqlitePool,
    kind: EntryKind,
    id: i64,
) -> sqlx::Result<Option<LibraryEntry>> {
    let sql = format!(
        "SELECT id, path, checksum FROM {} WHERE id = ?",
        kind.table()
    );
    let row: Option<EntryRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;

    Ok(row.map(|r| r.into_entry(kind)))
}

/// Get all entries of one kind, ordered by path.
pub async fn entries_of_kind(
    pool: &SqlitePool,
    kind: EntryKind,
) -> sqlx::Result<Vec<LibraryEntry>> {
    let sql = format!(
        "SELECT id, path, checksum FROM {} ORDER BY path",
        kind.table()
    );
    let rows: Vec<EntryRow> = sqlx::query_as(&sql).fetch_all(pool).await?;

    Ok(rows.into_iter().map(|r| r.into_entry(kind)).collect())
}

/// Get every tracked entry: scenes first, then galleries.
pub async fn all_entries(pool: &SqlitePool) -> sqlx::Result<Vec<LibraryEntry>> {
    let mut entries = Vec::new();
    for kind in EntryKind::ALL {
        entries.extend(entries_of_kind(pool, kind).await?);
    }
    Ok(entries)
}

/// Count the entity rows of one kind.
pub async fn count_entries(pool: &SqlitePool, kind: EntryKind) -> sqlx::Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    let row: (i64,) = sqlx::query_as(&sql).fetch_one(pool).await?;
    Ok(row.0)
}
