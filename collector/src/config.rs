//! Collector configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rewards_store::RetentionPolicy;

use crate::logging::LogFormat;
use crate::CollectorError;

/// Default LMDB map size: 16 GiB of address space.
pub const DEFAULT_LMDB_MAP_SIZE: usize = 16 * 1024 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Keep a window of recent cycles.
    Rolling,
    /// Keep every cycle.
    Archive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_mode")]
    pub mode: StorageMode,

    /// Cycles kept behind the one being processed in rolling mode.
    #[serde(default = "default_stored_cycles")]
    pub stored_cycles: u32,
}

impl StorageConfig {
    pub fn retention(&self) -> RetentionPolicy {
        match self.mode {
            StorageMode::Rolling => RetentionPolicy::Rolling {
                stored_cycles: self.stored_cycles,
            },
            StorageMode::Archive => RetentionPolicy::Archive,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: default_storage_mode(),
            stored_cycles: default_stored_cycles(),
        }
    }
}

/// Configuration for the collector.
///
/// Can be loaded from a TOML file via [`CollectorConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Node RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Directory of the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Delegates reconstructed concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Seconds between checks for newly completed cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How many completed cycles behind head the collector goes back to.
    #[serde(default = "default_max_catch_up_cycles")]
    pub max_catch_up_cycles: u32,

    /// Timeout of a single RPC request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_rpc_url() -> String {
    "http://127.0.0.1:8732".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./rewards_data")
}

fn default_storage_mode() -> StorageMode {
    StorageMode::Rolling
}

fn default_stored_cycles() -> u32 {
    20
}

fn default_parallelism() -> usize {
    100
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_max_catch_up_cycles() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_lmdb_map_size() -> usize {
    DEFAULT_LMDB_MAP_SIZE
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl CollectorConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, CollectorError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CollectorError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, CollectorError> {
        let config: Self = toml::from_str(s).map_err(|e| CollectorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, CollectorError> {
        toml::to_string_pretty(self).map_err(|e| CollectorError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.parallelism == 0 {
            return Err(CollectorError::Config("parallelism must be at least 1".into()));
        }
        if self.max_catch_up_cycles == 0 {
            return Err(CollectorError::Config(
                "max_catch_up_cycles must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CollectorError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        self.log_format()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, CollectorError> {
        self.log_format.parse()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            data_dir: default_data_dir(),
            storage: StorageConfig::default(),
            parallelism: default_parallelism(),
            poll_interval_secs: default_poll_interval_secs(),
            max_catch_up_cycles: default_max_catch_up_cycles(),
            request_timeout_secs: default_request_timeout_secs(),
            lmdb_map_size: default_lmdb_map_size(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
