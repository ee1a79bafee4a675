//! Configuration management for PulseSync
//!
//! This crate handles loading and validating `pulsesync.toml`.

use pulse_common::{PulseError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Application data root (set programmatically, not in TOML)
    #[serde(skip)]
    pub root: PathBuf,

    /// Local store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Sync engine settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Telemetry settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Local store configuration ([store])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file name, resolved against the application data root
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

fn default_db_file() -> String {
    "pulsesync.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_file: default_db_file(),
        }
    }
}

/// Sync engine configuration ([sync])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between periodic drain passes while online
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,

    /// Queue entries retried beyond this count are dropped
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Initial backoff for local store initialization retries
    #[serde(default = "default_init_backoff_ms")]
    pub init_backoff_ms: u64,

    /// Backoff ceiling for local store initialization retries
    #[serde(default = "default_init_backoff_max_ms")]
    pub init_backoff_max_ms: u64,
}

fn default_drain_interval_secs() -> u64 {
    30
}
fn default_retry_limit() -> u32 {
    5
}
fn default_init_backoff_ms() -> u64 {
    1_000
}
fn default_init_backoff_max_ms() -> u64 {
    30_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drain_interval_secs: default_drain_interval_secs(),
            retry_limit: default_retry_limit(),
            init_backoff_ms: default_init_backoff_ms(),
            init_backoff_max_ms: default_init_backoff_max_ms(),
        }
    }
}

/// Telemetry configuration ([telemetry])
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from the application data root
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join("pulsesync.toml");

        if !config_path.exists() {
            // Return default config
            return Ok(Self {
                root: root.to_path_buf(),
                ..Default::default()
            });
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| PulseError::Validation(format!("Failed to read config: {}", e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| PulseError::Validation(format!("Failed to parse config: {}", e)))?;

        config.root = root.to_path_buf();
        Ok(config)
    }

    /// Absolute path of the local store database file
    pub fn db_path(&self) -> PathBuf {
        self.root.join(&self.store.db_file)
    }
}
