//! Decides whether a tracked file is still a valid, in-scope library file.
//!
//! Three rules are applied in order, the first failing one decides:
//!
//! ```text
//! 1. exists as a regular file?          no  -> Delete(Missing)
//! 2. directory under a library root?    no  -> Delete(OutsideRoots)
//! 3. matches an exclusion pattern?      yes -> Delete(Excluded)
//!                                            -> Keep
//! ```
//!
//! Classification never mutates anything. The only I/O is the metadata call
//! in rule 1, which blocks; async callers run it on the blocking pool.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use regex::{Regex, RegexBuilder};

use super::error::CleanError;
use crate::config::LibraryConfig;

/// Why an entry is considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaleReason {
    /// The backing file is gone or is not a regular file
    Missing,
    /// The file lives outside every configured library root
    OutsideRoots,
    /// The file matches an exclusion pattern
    Excluded,
}

impl StaleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "file not found",
            Self::OutsideRoots => "outside library roots",
            Self::Excluded => "matched exclusion pattern",
        }
    }
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Delete(StaleReason),
}

/// Compiled exclusion patterns.
///
/// Patterns match case-insensitively anywhere in the path.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    patterns: Vec<Regex>,
}

impl Exclusions {
    /// Compile patterns, skipping (and logging) any that are invalid.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|pattern| {
                let pattern = pattern.as_ref();
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::error!(target: "clean", "Invalid exclusion pattern {:?}: {}", pattern, e);
                        None
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    /// Check whether any pattern matches the path.
    pub fn matches(&self, path: &Path) -> bool {
        let haystack = path.to_string_lossy();
        self.patterns.iter().any(|re| re.is_match(&haystack))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Snapshot of the library roots and exclusions for one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct LibraryRules {
    roots: Vec<PathBuf>,
    exclusions: Exclusions,
}

impl LibraryRules {
    pub fn new(roots: Vec<PathBuf>, exclusions: Exclusions) -> Self {
        Self { roots, exclusions }
    }

    /// Build rules from the `[library]` config section.
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(config.roots.clone(), Exclusions::compile(&config.excludes))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    /// Classify a tracked file.
    pub fn classify(&self, path: &Path) -> Verdict {
        classify(path, &self.roots, &self.exclusions)
    }
}

/// Classify `path` against `roots` and `exclusions`.
pub fn classify(path: &Path, roots: &[PathBuf], exclusions: &Exclusions) -> Verdict {
    if !is_regular_file(path) {
        return Verdict::Delete(StaleReason::Missing);
    }

    tracing::debug!(target: "clean", "File found: {}", path.display());

    if !in_any_root(path, roots) {
        return Verdict::Delete(StaleReason::OutsideRoots);
    }

    if exclusions.matches(path) {
        return Verdict::Delete(StaleReason::Excluded);
    }

    Verdict::Keep
}

/// True if `path` resolves (following symlinks) to an existing regular file.
pub fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// True if the file's directory is equal to or nested under one of `roots`.
///
/// Roots that cannot be compared are logged and count as non-containing.
pub fn in_any_root(path: &Path, roots: &[PathBuf]) -> bool {
    let dir = match normalize(path) {
        Ok(file) => file.parent().map(Path::to_path_buf).unwrap_or(file),
        Err(e) => {
            tracing::warn!(target: "clean", "Cannot resolve {}: {}", path.display(), e);
            return false;
        }
    };

    for root in roots {
        match dir_within_root(&dir, root) {
            Ok(true) => {
                tracing::debug!(target: "clean", "File {} belongs to root {}", path.display(), root.display());
                return true;
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(target: "clean", "{}", e),
        }
    }

    tracing::debug!(target: "clean", "File {} is outside all library roots", path.display());
    false
}

/// Compare an already-normalized directory against one root.
///
/// Comparison is component-wise, so `/lib/a` never contains `/lib/ab`.
pub fn dir_within_root(dir: &Path, root: &Path) -> Result<bool, CleanError> {
    if root.as_os_str().is_empty() {
        return Err(CleanError::ClassificationAmbiguous {
            root: root.to_path_buf(),
            message: "empty root path".to_string(),
        });
    }

    let root = normalize(root).map_err(|e| CleanError::ClassificationAmbiguous {
        root: root.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(dir.starts_with(&root))
}

/// Make a path absolute and resolve `.` and `..` lexically.
///
/// Symlinks are not followed; `..` at the filesystem root stays at the root.
pub fn normalize(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }

    Ok(out)
}
