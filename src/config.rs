//! Configuration loading and management
//!
//! Handles parsing of the `planboard.toml` file in the data directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// File name of the config inside the data directory
pub const CONFIG_FILE: &str = "planboard.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Board columns
    #[serde(default)]
    pub board: BoardConfig,

    /// Session identity fallback
    #[serde(default)]
    pub session: SessionConfig,

    /// Remote sync behavior
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Board configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Allowed statuses, in column order
    #[serde(default = "default_statuses")]
    pub statuses: Vec<String>,

    /// Status given to new items
    #[serde(default = "default_status")]
    pub default_status: String,

    /// Statuses counted as done
    #[serde(default = "default_done_statuses")]
    pub done_statuses: Vec<String>,
}

fn default_statuses() -> Vec<String> {
    vec!["todo".to_string(), "in-progress".to_string(), "done".to_string()]
}

fn default_status() -> String {
    "todo".to_string()
}

fn default_done_statuses() -> Vec<String> {
    vec!["done".to_string()]
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            statuses: default_statuses(),
            default_status: default_status(),
            done_statuses: default_done_statuses(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// User id to act as when no other identity is given
    #[serde(default)]
    pub default_user: String,
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Re-fetch the board after every confirmed move
    #[serde(default)]
    pub refetch_after_move: bool,

    /// How long to wait for the file store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refetch_after_move: false,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a data directory, or return defaults when absent
    pub fn load_from_dir(data_dir: &Path) -> crate::error::Result<Self> {
        let config_path = config_path(data_dir);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::lock::write_atomic_str(path, &content)
    }

    fn validate(&self) -> crate::error::Result<()> {
        self.board.validate()?;
        if self.sync.lock_timeout_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "sync.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Path of the config file inside `data_dir`
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

impl BoardConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.statuses.is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "board.statuses cannot be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for status in &self.statuses {
            let trimmed = status.trim();
            if trimmed.is_empty() {
                return Err(crate::error::Error::InvalidConfig(
                    "board.statuses cannot include empty entries".to_string(),
                ));
            }
            if trimmed != status {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "board.statuses entry '{status}' has surrounding whitespace"
                )));
            }
            if !seen.insert(trimmed.to_string()) {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "board.statuses has duplicate entry '{trimmed}'"
                )));
            }
        }

        if !seen.contains(self.default_status.as_str()) {
            return Err(crate::error::Error::InvalidConfig(format!(
                "board.default_status '{}' not in board.statuses",
                self.default_status
            )));
        }

        if self.done_statuses.is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "board.done_statuses cannot be empty".to_string(),
            ));
        }

        for status in &self.done_statuses {
            if !seen.contains(status.as_str()) {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "board.done_statuses '{status}' not in board.statuses"
                )));
            }
        }

        Ok(())
    }
}
