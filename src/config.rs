//! Daemon configuration
//!
//! JSON config read through a `FileSystem`, so a config that lives next to
//! the watched manifests goes through the same cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::fs::FileSystem;

/// Socket path used when the config does not set one
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/cachefs.sock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Unix socket the IPC server listens on
    pub socket_path: PathBuf,

    /// Root for temp files (OS default when unset)
    pub temp_root: Option<PathBuf>,

    /// Drop the caches on this period; 0 or unset disables the timer
    pub drop_cache_interval_secs: Option<u64>,

    /// Log level used when RUST_LOG is not set
    pub log_level: Option<String>,

    // Does not start the IPC server; just runs the invalidation triggers
    pub act_as_worker: bool,

    /// Patterns expanded at start-up and after every cache drop
    pub watch_globs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            temp_root: None,
            drop_cache_interval_secs: None,
            log_level: None,
            act_as_worker: false,
            watch_globs: Vec::new(),
        }
    }
}

impl Config {
    /// Load a config file through `fs`
    pub fn from_path(path: &Path, fs: &dyn FileSystem) -> Result<Self> {
        let bytes = fs
            .read_file(path)
            .with_context(|| format!("Reading config {}", path.display()))?;

        serde_json::from_slice(&bytes).context("Unmarshalling config")
    }

    /// `<config dir>/cachefs/config.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("cachefs")
            .join("config.json")
    }

    pub fn drop_cache_interval(&self) -> Option<Duration> {
        self.drop_cache_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Parsed `logLevel`, ignoring values that are not a tracing level
    pub fn log_level(&self) -> Option<Level> {
        self.log_level.as_deref().and_then(|s| s.parse().ok())
    }
}
