//! Data directory layout and JSON file helpers.
//!
//! # Directory Structure
//!
//! ```text
//! <data dir>/
//!   planboard.toml              # Board configuration
//!   user                        # Persisted session user
//!   collections/                # File-backed remote store
//!     tasks.json                # Rows of one collection (JSON array)
//!     tasks.json.lock           # Lock guarding read-modify-write
//! ```
//!
//! The data directory is `--data-dir`, else `PLANBOARD_DATA`, else the
//! platform data directory.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config;
use crate::error::{Error, Result};
use crate::lock::{self, FileLock};
use crate::session;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PLANBOARD_DATA";

/// Subdirectory holding collection files.
pub const COLLECTIONS_DIR: &str = "collections";

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage rooted at the resolved data directory.
    pub fn discover(cli_dir: Option<&Path>) -> Result<Self> {
        resolve_data_dir(cli_dir).map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn config_file(&self) -> PathBuf {
        config::config_path(&self.root)
    }

    pub fn user_file(&self) -> PathBuf {
        session::user_path(&self.root)
    }

    pub fn collections_dir(&self) -> PathBuf {
        self.root.join(COLLECTIONS_DIR)
    }

    /// Path of a collection file; names are restricted to `[a-z0-9_-]`.
    pub fn collection_file(&self, collection: &str) -> Result<PathBuf> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid {
            return Err(Error::InvalidArgument(format!(
                "invalid collection name '{collection}'"
            )));
        }
        Ok(self.collections_dir().join(format!("{collection}.json")))
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.collections_dir())?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.collections_dir().is_dir()
    }

    // =========================================================================
    // JSON helpers
    // =========================================================================

    /// Write JSON atomically; readers never observe a partial file.
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read JSON, or the default value when the file does not exist yet.
    pub fn read_json_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T> {
        if path.exists() {
            self.read_json(path)
        } else {
            Ok(T::default())
        }
    }

    /// Locked read-modify-write of a JSON file.
    ///
    /// The new value is written only when `f` succeeds. Callers pick the
    /// error type so domain failures pass through unchanged.
    pub fn update_json<T, R, E, F>(&self, path: &Path, timeout_ms: u64, f: F) -> std::result::Result<R, E>
    where
        T: Serialize + DeserializeOwned + Default,
        E: From<Error>,
        F: FnOnce(&mut T) -> std::result::Result<R, E>,
    {
        let _lock = FileLock::acquire(lock::lock_path_for(path), timeout_ms)?;
        let mut value: T = self.read_json_or_default(path)?;
        let result = f(&mut value)?;
        self.write_json(path, &value)?;
        debug!(path = %path.display(), "updated json file");
        Ok(result)
    }

    /// Read a JSON file under its lock.
    pub fn read_json_locked<T>(&self, path: &Path, timeout_ms: u64) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        lock::with_lock(path, timeout_ms, || self.read_json_or_default(path))
    }
}

/// Resolve the data directory: flag, then environment, then platform default.
pub fn resolve_data_dir(cli_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = cli_dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    ProjectDirs::from("", "", "planboard")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::InvalidConfig(format!(
                "cannot determine a data directory; pass --data-dir or set {DATA_DIR_ENV}"
            ))
        })
}
