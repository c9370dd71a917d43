//! Configuration loading and management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Task store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl StoreConfig {
    /// Store config pointing at an explicit database file.
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("todo-state").join("tasks.db"))
        .unwrap_or_else(|| PathBuf::from(".todo-state/tasks.db"))
}

fn default_busy_timeout() -> u64 {
    crate::db::DEFAULT_BUSY_TIMEOUT_MS
}

/// Task list view configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// How long the filtered list keeps its store subscription alive after
    /// the last observer goes away, in milliseconds.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: default_stop_timeout(),
        }
    }
}

impl ViewConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

fn default_stop_timeout() -> u64 {
    5_000 // 5 seconds
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `todo_state=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 0/off, 1/stdout, 2/stderr, or a file name.
    #[serde(default = "default_log_target")]
    pub target: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            target: default_log_target(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_target() -> String {
    "2".to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from an explicit path, the default locations, or
    /// fall back to defaults.
    ///
    /// An explicit path that fails to load is an error; missing default
    /// files are not.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        for candidate in Self::default_locations() {
            if candidate.exists() {
                return Self::load(candidate);
            }
        }

        Ok(Self::default())
    }

    /// Candidate config files, project first.
    pub fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(".todo-state/config.yaml")];
        if let Some(dir) = dirs::config_dir() {
            locations.push(dir.join("todo-state").join("config.yaml"));
        }
        locations
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        self.store.ensure_db_dir()
    }
}

impl StoreConfig {
    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
