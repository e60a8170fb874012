use crate::repair::{RepairError, RunningOptions, DEFAULT_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_progress_interval_secs() -> u64 {
    5
}

/// Repair configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairConfig {
    /// Identities reconciled at the same time by the message repair
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds between two progress lines. 0 disables progress logging.
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            log_level: default_log_level(),
            progress_interval_secs: default_progress_interval_secs(),
        }
    }
}

impl RepairConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.running_options()?;
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("logLevel must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn running_options(&self) -> Result<RunningOptions, ConfigError> {
        RunningOptions::new(self.concurrency).map_err(|e| match e {
            RepairError::InvalidOptions(reason) => ConfigError::Invalid(reason),
            other => ConfigError::Invalid(other.to_string()),
        })
    }
}

/// Read the configuration file
pub async fn read_config(config_path: &Path) -> Result<Option<RepairConfig>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(config_path).await?;
    let config: RepairConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(Some(config))
}
