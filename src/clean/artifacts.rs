//! Removal of derived files after an entry has left the catalog.
//!
//! Cleanup is a post-commit hook: reconciliation tasks hand removed entries
//! to a [`CleanupQueue`] and report their own outcome immediately. A single
//! [`CleanupWorker`] drains the queue, logging failures without ever feeding
//! them back into the task results.
//!
//! # Generated layout
//!
//! ```text
//! <generated>/screenshots/<checksum>.jpg        screenshot
//! <generated>/screenshots/<checksum>.thumb.jpg  thumbnail
//! <generated>/screenshots/<checksum>.mp4        preview video
//! <generated>/screenshots/<checksum>.webp       preview image
//! <generated>/vtt/<checksum>_sprite.jpg         scrubber sprite
//! <generated>/vtt/<checksum>_thumbs.vtt         sprite index
//! <generated>/transcodes/<checksum>.mp4         transcode
//! <generated>/markers/<checksum>/               marker previews
//! ```

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::CleanError;
use crate::model::{EntryKind, LibraryEntry};

/// Removes the derived files of a removed entry.
///
/// Implement this trait to substitute the filesystem in tests.
#[async_trait]
pub trait ArtifactCleaner: Send + Sync {
    /// Remove every artifact of `entry`, returning how many paths were removed.
    async fn remove_artifacts(&self, entry: &LibraryEntry) -> Result<usize, CleanError>;
}

/// Artifacts under a generated-files directory.
#[derive(Debug, Clone)]
pub struct GeneratedFiles {
    root: PathBuf,
}

impl GeneratedFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Files generated for a scene with the given checksum.
    pub fn scene_files(&self, checksum: &str) -> Vec<PathBuf> {
        let screenshots = self.root.join("screenshots");
        let vtt = self.root.join("vtt");
        vec![
            screenshots.join(format!("{checksum}.jpg")),
            screenshots.join(format!("{checksum}.thumb.jpg")),
            screenshots.join(format!("{checksum}.mp4")),
            screenshots.join(format!("{checksum}.webp")),
            vtt.join(format!("{checksum}_sprite.jpg")),
            vtt.join(format!("{checksum}_thumbs.vtt")),
            self.root.join("transcodes").join(format!("{checksum}.mp4")),
        ]
    }

    /// Directory holding marker previews for a scene.
    pub fn markers_dir(&self, checksum: &str) -> PathBuf {
        self.root.join("markers").join(checksum)
    }
}

#[async_trait]
impl ArtifactCleaner for GeneratedFiles {
    async fn remove_artifacts(&self, entry: &LibraryEntry) -> Result<usize, CleanError> {
        // Galleries have nothing generated
        if entry.kind != EntryKind::Scene {
            return Ok(0);
        }
        // The checksum names files under the generated root; anything other
        // than one plain name (empty, "..", "a/b") would address other paths
        if !is_plain_name(&entry.checksum) {
            tracing::warn!(
                target: "clean::artifacts",
                "{} has an unusable checksum {:?}, skipping artifacts",
                entry,
                entry.checksum
            );
            return Ok(0);
        }

        let mut removed = 0;
        let mut first_error = None;

        for path in self.scene_files(&entry.checksum) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(artifact_error(entry, path, e));
                    }
                }
            }
        }

        let markers = self.markers_dir(&entry.checksum);
        match tokio::fs::remove_dir_all(&markers).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(artifact_error(entry, markers, e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }
}

/// True when `name` is exactly one normal path component.
fn is_plain_name(name: &str) -> bool {
    let mut parts = Path::new(name).components();
    matches!(
        (parts.next(), parts.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

fn artifact_error(entry: &LibraryEntry, path: PathBuf, source: std::io::Error) -> CleanError {
    CleanError::ArtifactCleanupFailed {
        kind: entry.kind,
        id: entry.id,
        path,
        source,
    }
}

/// Totals reported by a drained [`CleanupWorker`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    /// Entries whose artifacts were processed
    pub entries: usize,
    /// Paths removed across all entries
    pub files_removed: usize,
    /// Entries whose cleanup reported an error
    pub failures: usize,
}

/// Sending side of the artifact cleanup queue.
#[derive(Debug, Clone)]
pub struct CleanupQueue {
    tx: mpsc::UnboundedSender<LibraryEntry>,
}

impl CleanupQueue {
    /// Queue a removed entry. Never waits on the cleanup itself.
    pub fn submit(&self, entry: LibraryEntry) {
        if let Err(e) = self.tx.send(entry) {
            tracing::warn!(target: "clean::artifacts", "Cleanup worker gone, artifacts of {} left behind", e.0);
        }
    }
}

/// Background task draining a [`CleanupQueue`].
pub struct CleanupWorker {
    handle: JoinHandle<CleanupStats>,
}

impl CleanupWorker {
    /// Start a worker and return the queue feeding it.
    pub fn spawn(cleaner: Arc<dyn ArtifactCleaner>) -> (CleanupQueue, CleanupWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(cleaner, rx));
        (CleanupQueue { tx }, CleanupWorker { handle })
    }

    /// Wait until every queue clone is dropped and the backlog is processed.
    pub async fn finish(self) -> CleanupStats {
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(target: "clean::artifacts", "Cleanup worker failed: {}", e);
                CleanupStats::default()
            }
        }
    }
}

async fn run_worker(
    cleaner: Arc<dyn ArtifactCleaner>,
    mut rx: mpsc::UnboundedReceiver<LibraryEntry>,
) -> CleanupStats {
    let mut stats = CleanupStats::default();

    while let Some(entry) = rx.recv().await {
        stats.entries += 1;
        match cleaner.remove_artifacts(&entry).await {
            Ok(count) => {
                stats.files_removed += count;
                tracing::debug!(target: "clean::artifacts", "Removed {} artifacts of {}", count, entry);
            }
            Err(e) => {
                stats.failures += 1;
                tracing::warn!(target: "clean::artifacts", "{}", e);
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FailingCleaner, RecordingCleaner};
    use std::fs;
    use tempfile::TempDir;

    fn scene(id: i64, checksum: &str) -> LibraryEntry {
        LibraryEntry::new(EntryKind::Scene, id, format!("/lib/a/{id}.mp4"), checksum)
    }

    fn populate(generated: &GeneratedFiles, checksum: &str) {
        for path in generated.scene_files(checksum) {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"x").unwrap();
        }
        let markers = generated.markers_dir(checksum);
        fs::create_dir_all(&markers).unwrap();
        fs::write(markers.join("12.mp4"), b"x").unwrap();
    }

    #[tokio::test]
    async fn test_generated_files_removes_scene_layout() {
        let temp = TempDir::new().unwrap();
        let generated = GeneratedFiles::new(temp.path());
        populate(&generated, "abc");
        populate(&generated, "other");

        let removed = generated.remove_artifacts(&scene(8, "abc")).await.unwrap();
        assert_eq!(removed, 8);

        for path in generated.scene_files("abc") {
            assert!(!path.exists(), "{:?} should be gone", path);
        }
        assert!(!generated.markers_dir("abc").exists());

        // Other scenes keep their artifacts
        assert!(generated.scene_files("other").iter().all(|p| p.exists()));
    }

    #[tokio::test]
    async fn test_generated_files_tolerates_absent_files() {
        let temp = TempDir::new().unwrap();
        let generated = GeneratedFiles::new(temp.path());

        let removed = generated.remove_artifacts(&scene(8, "abc")).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_generated_files_skips_galleries_and_blank_checksums() {
        let temp = TempDir::new().unwrap();
        let generated = GeneratedFiles::new(temp.path());
        populate(&generated, "abc");

        let gallery = LibraryEntry::new(EntryKind::Gallery, 1, "/lib/a/pics.zip", "abc");
        assert_eq!(generated.remove_artifacts(&gallery).await.unwrap(), 0);
        assert_eq!(generated.remove_artifacts(&scene(2, "")).await.unwrap(), 0);
        assert!(generated.scene_files("abc").iter().all(|p| p.exists()));
    }

    #[tokio::test]
    async fn test_traversing_checksums_touch_nothing() {
        let temp = TempDir::new().unwrap();
        let generated = GeneratedFiles::new(temp.path().join("generated"));
        populate(&generated, "other");
        let outside = temp.path().join("keep.txt");
        fs::write(&outside, b"x").unwrap();

        for checksum in ["..", "../..", ".", "a/b", "other/", "/abs"] {
            let removed = generated
                .remove_artifacts(&scene(8, checksum))
                .await
                .unwrap();
            assert_eq!(removed, 0, "checksum {:?}", checksum);
        }

        assert!(generated.scene_files("other").iter().all(|p| p.exists()));
        assert!(generated.markers_dir("other").exists());
        assert!(outside.exists());
    }

    #[test]
    fn test_is_plain_name() {
        assert!(is_plain_name("3f2a9c"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("abc/"));
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let cleaner = Arc::new(RecordingCleaner::default());
        let (queue, worker) = CleanupWorker::spawn(cleaner.clone());

        queue.submit(scene(1, "a"));
        queue.submit(scene(2, "b"));
        drop(queue);

        let stats = worker.finish().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.failures, 0);
        assert_eq!(cleaner.ids(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_worker_counts_failures() {
        let (queue, worker) = CleanupWorker::spawn(Arc::new(FailingCleaner));

        queue.submit(scene(1, "a"));
        drop(queue);

        let stats = worker.finish().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.failures, 1);
    }
}
