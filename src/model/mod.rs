//! Core data models for the media catalog.
//!
//! Defines the tracked entities the janitor reconciles: [`LibraryEntry`]
//! tagged with an [`EntryKind`].
//!
//! # Database Schema
//!
//! The kinds map to the following tables:
//! - `scenes` - Video files, referenced by markers, tag, performer and movie links
//! - `galleries` - Image archives, referenced by tag and performer links

use std::fmt;
use std::path::PathBuf;

/// The kind of a tracked, path-backed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Scene,
    Gallery,
}

impl EntryKind {
    /// All kinds, in the order a full pass visits them.
    pub const ALL: [EntryKind; 2] = [EntryKind::Scene, EntryKind::Gallery];

    /// Table holding the entity rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Scene => "scenes",
            Self::Gallery => "galleries",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Gallery => "gallery",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked catalog record backed by one file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    /// Database ID
    pub id: i64,
    /// Entity kind (selects table and dependent rows)
    pub kind: EntryKind,
    /// Absolute file path
    pub path: String,
    /// Content checksum; generated artifacts are stored under it
    pub checksum: String,
}

impl LibraryEntry {
    pub fn new(
        kind: EntryKind,
        id: i64,
        path: impl Into<String>,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            path: path.into(),
            checksum: checksum.into(),
        }
    }

    /// Convert the path string to a PathBuf.
    pub fn path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

impl fmt::Display for LibraryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.id, self.path)
    }
}
