//! Relay configuration loaded from YAML

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading relay configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML from a file
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to parse YAML from a string
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A configuration value is missing or unusable
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_snapshot_timeout() -> u64 {
    10
}

/// Configuration for one relay target
///
/// Immutable for the lifetime of a dispatcher; changing the target device
/// or its allowlist means building a new dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP base URL of the bot endpoint
    pub bot_url: String,

    /// Streaming URL of the bot; every delivery takes the HTTP path when
    /// this is absent
    #[serde(default)]
    pub bot_ws_url: Option<String>,

    /// Device whose entities are relayed
    pub device_id: String,

    /// Allowlist of entity display names or IDs for whole-device queries;
    /// empty admits every entity of the device
    #[serde(default)]
    pub entities: Vec<String>,

    /// Base URL of the host platform, used for snapshot proxy fetches;
    /// snapshots are skipped entirely when absent
    #[serde(default)]
    pub source_url: Option<String>,

    /// Bearer credential presented on snapshot fetches
    #[serde(default)]
    pub access_token: Option<String>,

    /// Seconds between periodic whole-device refreshes; disabled when absent
    #[serde(default)]
    pub update_interval_secs: Option<u64>,

    /// Streaming connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Snapshot fetch timeout in seconds
    #[serde(default = "default_snapshot_timeout")]
    pub snapshot_timeout_secs: u64,
}

impl RelayConfig {
    /// Load and validate configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.bot_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "bot_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "device_id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Streaming connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Snapshot fetch timeout
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }

    /// Periodic refresh interval, when configured
    pub fn update_interval(&self) -> Option<Duration> {
        self.update_interval_secs.map(Duration::from_secs)
    }
}
