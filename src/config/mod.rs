//! # Orchestrator Configuration
//!
//! Layered configuration for the batch orchestrator: built-in defaults, an
//! optional base YAML file, an optional per-environment YAML file, then
//! `AVATAR_BATCH__*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use avatar_batch::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let policy = manager.config().batch.policy();
//! println!("max concurrent provider calls: {}", policy.max_concurrent);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{policy_defaults, status_kinds};
use crate::models::{BatchPolicy, PrerequisiteKind};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{detect_environment, ConfigManager};

/// Root configuration structure mirroring avatar-batch.yaml
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct OrchestratorConfig {
    /// Defaults applied to batches
    #[serde(default)]
    pub batch: BatchDefaults,

    /// Progress sink settings
    #[serde(default)]
    pub progress: ProgressConfig,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.batch.validate()?;
        self.progress.validate()
    }
}

/// Batch policy defaults
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchDefaults {
    pub max_concurrent: usize,
    pub per_item_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub regenerate_existing: bool,
    pub required_prerequisites: Vec<PrerequisiteKind>,
}

impl BatchDefaults {
    pub fn per_item_timeout(&self) -> Duration {
        Duration::from_secs(self.per_item_timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Policy handed to requests that do not carry their own knobs
    pub fn policy(&self) -> BatchPolicy {
        BatchPolicy {
            max_concurrent: self.max_concurrent,
            per_item_timeout: self.per_item_timeout(),
            retry_attempts: self.retry_attempts,
            retry_delay: self.retry_delay(),
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent < 1 {
            return Err(ConfigurationError::invalid_value(
                "batch.max_concurrent",
                self.max_concurrent,
                "must be at least 1",
            ));
        }
        if self.retry_attempts < 1 {
            return Err(ConfigurationError::invalid_value(
                "batch.retry_attempts",
                self.retry_attempts,
                "must be at least 1",
            ));
        }
        if self.per_item_timeout_seconds < 1 {
            return Err(ConfigurationError::invalid_value(
                "batch.per_item_timeout_seconds",
                self.per_item_timeout_seconds,
                "must be at least 1",
            ));
        }
        if self.per_item_timeout_seconds > policy_defaults::MAX_PER_ITEM_TIMEOUT_SECONDS {
            return Err(ConfigurationError::invalid_value(
                "batch.per_item_timeout_seconds",
                self.per_item_timeout_seconds,
                format!(
                    "must not exceed {}",
                    policy_defaults::MAX_PER_ITEM_TIMEOUT_SECONDS
                ),
            ));
        }
        Ok(())
    }
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            max_concurrent: policy_defaults::MAX_CONCURRENT,
            per_item_timeout_seconds: policy_defaults::PER_ITEM_TIMEOUT_SECONDS,
            retry_attempts: policy_defaults::RETRY_ATTEMPTS,
            retry_delay_ms: policy_defaults::RETRY_DELAY_MS,
            regenerate_existing: false,
            required_prerequisites: vec![PrerequisiteKind::Audio],
        }
    }
}

/// Progress sink configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Kind passed to `create_status`
    pub status_kind: String,
    /// Bound on draining queued progress writes and on the terminal status push
    pub sink_timeout_ms: u64,
}

impl ProgressConfig {
    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.sink_timeout_ms < 1 {
            return Err(ConfigurationError::invalid_value(
                "progress.sink_timeout_ms",
                self.sink_timeout_ms,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            status_kind: status_kinds::AVATAR_VIDEO_BATCH.to_string(),
            sink_timeout_ms: policy_defaults::SINK_TIMEOUT_MS,
        }
    }
}
