//! Configuration loading from TOML files

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use profline_core::{SessionConfig, StallPolicy};
use serde::Deserialize;

/// Global configuration for profline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sink: SinkConfig,
    pub timing: TimingConfig,
    pub processor: ProcessorSection,
    pub sender: SenderSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(SessionConfig::DEFAULT_STORAGE),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub address: Option<String>,
    pub latency_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            address: Some(SessionConfig::DEFAULT_SINK_ADDRESS.to_string()),
            latency_ms: SessionConfig::DEFAULT_SINK_LATENCY.as_millis() as u64,
        }
    }
}

/// Worker timings in milliseconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub generation_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub pace_ms: u64,
    pub batch_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            generation_interval_ms: SessionConfig::DEFAULT_GENERATION_INTERVAL.as_millis() as u64,
            poll_timeout_ms: SessionConfig::DEFAULT_POLL_TIMEOUT.as_millis() as u64,
            pace_ms: SessionConfig::DEFAULT_PACE.as_millis() as u64,
            batch_interval_ms: SessionConfig::DEFAULT_BATCH_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct ProcessorSection {
    pub stall_policy: StallPolicy,
}

/// Settings for `profline drain`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SenderSection {
    /// Consecutive empty drains before a standalone drain stops
    pub max_empty_drains: u32,
}

impl Default for SenderSection {
    fn default() -> Self {
        Self {
            max_empty_drains: 3,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./profline.toml (current directory)
    /// 2. ~/.config/profline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("profline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "profline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Session settings for `record_count` records, before CLI overrides
    pub fn session(&self, record_count: usize) -> SessionConfig {
        SessionConfig {
            storage_location: self.storage.path.clone(),
            sink_address: self.sink.address.clone().unwrap_or_default(),
            sink_latency: Duration::from_millis(self.sink.latency_ms),
            generation_interval: Duration::from_millis(self.timing.generation_interval_ms),
            processing_poll_timeout: Duration::from_millis(self.timing.poll_timeout_ms),
            processing_pace: Duration::from_millis(self.timing.pace_ms),
            batch_interval: Duration::from_millis(self.timing.batch_interval_ms),
            stall_policy: self.processor.stall_policy,
            ..SessionConfig::new(record_count)
        }
    }
}
