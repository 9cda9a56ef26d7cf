//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\catalog-janitor\config.toml
//! - macOS: ~/Library/Application Support/catalog-janitor/config.toml
//! - Linux: ~/.config/catalog-janitor/config.toml
//!
//! The config file is human-readable and editable. A different file can be
//! given with `--config`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::clean::runner::DEFAULT_CONCURRENCY;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library scope: roots and exclusions
    pub library: LibraryConfig,

    /// Where the catalog and its generated files live
    pub storage: StorageConfig,

    /// Reconciliation tuning
    pub clean: CleanConfig,
}

/// Library scope settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directories whose files belong in the catalog
    pub roots: Vec<PathBuf>,

    /// Case-insensitive regular expressions; matching paths are removed
    pub excludes: Vec<String>,
}

/// Storage locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Catalog database file (default: catalog.db in the data directory)
    pub database: Option<PathBuf>,

    /// Generated-files directory (default: generated/ in the data directory)
    pub generated: Option<PathBuf>,
}

impl StorageConfig {
    /// Database path, falling back to the data directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database
            .clone()
            .or_else(|| data_dir().map(|d| d.join(crate::db::DEFAULT_DB_NAME)))
    }

    /// Generated-files directory, falling back to the data directory.
    pub fn generated_dir(&self) -> Option<PathBuf> {
        self.generated
            .clone()
            .or_else(|| data_dir().map(|d| d.join("generated")))
    }
}

/// Reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Maximum reconciliation tasks in flight
    pub concurrency: usize,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("catalog-janitor"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Get the data directory holding the default database and generated files
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("catalog-janitor"))
}

/// Load configuration from `path`, or from [`config_path`] when `None`.
///
/// A missing file yields the default config. A file that cannot be read or
/// parsed is an error: a cleanup run must not silently fall back to an
/// empty set of roots.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path().ok_or(ConfigError::NoConfigDir)?,
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let contents =
        std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
    let config = toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.clone(), e))?;

    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}

/// Save configuration to `path`, or to [`config_path`] when `None`.
///
/// Creates the parent directory if it doesn't exist.
pub fn save(config: &Config, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path().ok_or(ConfigError::NoConfigDir)?,
    };

    // Ensure directory exists
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(path)
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
