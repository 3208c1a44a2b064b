//! Configuration management for batchers.

use crate::{BatcherError, BatcherResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Validated flush limits for a single batcher
///
/// Both limits are fixed for the lifetime of the batcher they are handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    size: usize,
    age: Duration,
}

impl BatchLimits {
    /// Create new limits
    ///
    /// A zero `size` is rejected: it would make an empty buffer count as full.
    /// A zero `age` is allowed and flushes each first item as soon as the loop is scheduled.
    pub fn new(size: usize, age: Duration) -> BatcherResult<Self> {
        if size == 0 {
            return Err(BatcherError::config("batch size must be > 0"));
        }
        Ok(Self { size, age })
    }

    /// Maximum number of items per batch
    pub fn size(&self) -> usize {
        self.size
    }

    /// Maximum time the oldest buffered item may wait
    pub fn age(&self) -> Duration {
        self.age
    }
}

/// Main configuration for batchers
///
/// Every field is optional in the TOML file; missing ones fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Batcher name, used as the `batcher` label on metrics and in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Flush limits
    #[serde(default)]
    pub batching: BatchSettings,

    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl BatcherConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - `BATCHER_NAME`
    /// - `BATCH_MAX_SIZE`
    /// - `BATCH_MAX_AGE_MS`
    ///
    /// Anything not set uses defaults.
    pub fn from_env() -> BatcherResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> BatcherResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BatcherError::config(format!("Failed to read config file {}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            BatcherError::config(format!("Failed to parse config file {}: {}", path, e))
        })
    }

    /// Apply environment variable overrides on top of the current values
    pub fn apply_env_overrides(&mut self) -> BatcherResult<()> {
        if let Ok(val) = env::var("BATCHER_NAME") {
            self.name = val;
        }
        if let Ok(val) = env::var("BATCH_MAX_SIZE") {
            self.batching.max_size = val
                .parse()
                .map_err(|_| BatcherError::config(format!("Invalid BATCH_MAX_SIZE: {}", val)))?;
        }
        if let Ok(val) = env::var("BATCH_MAX_AGE_MS") {
            self.batching.max_age_ms = val
                .parse()
                .map_err(|_| BatcherError::config(format!("Invalid BATCH_MAX_AGE_MS: {}", val)))?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> BatcherResult<()> {
        if self.name.is_empty() {
            return Err(BatcherError::config("name cannot be empty"));
        }

        self.limits().map(|_| ())
    }

    /// Build the validated flush limits
    pub fn limits(&self) -> BatcherResult<BatchLimits> {
        BatchLimits::new(
            self.batching.max_size,
            Duration::from_millis(self.batching.max_age_ms),
        )
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            batching: BatchSettings::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_name() -> String {
    "batcher".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Batch size and age settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Maximum items per batch
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Maximum age of the oldest buffered item in milliseconds
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,
}

fn default_max_size() -> usize {
    1000
}
fn default_max_age_ms() -> u64 {
    1000
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            max_age_ms: default_max_age_ms(),
        }
    }
}
