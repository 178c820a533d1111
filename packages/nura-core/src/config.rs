/// Configuration for the board store.
/// Read from ~/.config/nura-task/config.json (or platform equivalent); every field is optional.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "nura-task";

/// Names of the persisted values in the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub boards: String,
    pub members: String,
    pub active_board: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            boards: "nura-task-boards".to_string(),
            members: "nura-task-members".to_string(),
            active_board: "active-board-id".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Interval between ticks; each tick accrues one second.
    pub tick_millis: u64,
    /// Ticks between intermediate commits to the store.
    pub commit_every_ticks: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_millis: 1000,
            commit_every_ticks: 10,
        }
    }
}

impl TrackerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the persisted values. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// Upper bound on total persisted bytes, like a browser storage quota.
    pub quota_bytes: Option<u64>,
    pub keys: StorageKeys,
    pub tracker: TrackerConfig,
}

impl StoreConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Default config path: ~/.config/nura-task/config.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

/// Default data directory: ~/.local/share/nura-task (or platform equivalent)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Load config from path. Returns defaults if the file is missing or unreadable.
pub fn load_config(path: &Path) -> StoreConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[nura.config] Failed to parse config {}: {}", path.display(), e);
            StoreConfig::default()
        }),
        Err(_) => {
            log::info!("[nura.config] No config at {}, using defaults", path.display());
            StoreConfig::default()
        }
    }
}
