//! Configuration Loader
//!
//! Environment-aware loading: defaults, then `avatar-batch.yaml`, then
//! `avatar-batch.<environment>.yaml`, then `AVATAR_BATCH__*` variables.

use super::error::{ConfigResult, ConfigurationError};
use super::OrchestratorConfig;
use crate::constants::env as env_keys;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "avatar-batch";

/// Get current environment from environment variables
pub fn detect_environment() -> String {
    env::var(env_keys::ENVIRONMENT)
        .or_else(|_| env::var(env_keys::FALLBACK_ENVIRONMENT))
        .unwrap_or_else(|_| env_keys::DEFAULT_ENVIRONMENT.to_string())
}

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: OrchestratorConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_environment_source(
            config_dir,
            environment,
            Environment::with_prefix(env_keys::CONFIG_PREFIX).separator("__"),
        )
    }

    fn load_with_environment_source(
        config_dir: Option<PathBuf>,
        environment: &str,
        env_source: Environment,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading orchestrator configuration"
        );

        if config_directory.exists() && !config_directory.is_dir() {
            return Err(ConfigurationError::invalid_value(
                "config_directory",
                config_directory.display(),
                "configuration path must be a directory",
            ));
        }

        let base_file = config_directory.join(format!("{BASE_FILE_STEM}.yaml"));
        let env_file = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.yaml"));

        let config: OrchestratorConfig = Config::builder()
            .add_source(Config::try_from(&OrchestratorConfig::default())?)
            .add_source(File::from(base_file.as_path()).required(false))
            .add_source(File::from(env_file.as_path()).required(false))
            .add_source(env_source.try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = environment,
            max_concurrent = config.batch.max_concurrent,
            retry_attempts = config.batch.retry_attempts,
            per_item_timeout_seconds = config.batch.per_item_timeout_seconds,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Parse a single YAML document without layering; used by tooling
    pub fn from_yaml_file(path: &Path) -> ConfigResult<OrchestratorConfig> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            ConfigurationError::FileRead {
                path: path.display().to_string(),
                source,
            }
        })?;
        let config: OrchestratorConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigurationError::Parse(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON, for diagnostics
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::json!({
            "environment": self.environment,
            "config_directory": self.config_directory.display().to_string(),
            "config": self.config,
        })
    }

    fn default_config_directory() -> PathBuf {
        env::var(format!("{}_CONFIG_DIR", env_keys::CONFIG_PREFIX))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrerequisiteKind;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn empty_env() -> Environment {
        Environment::with_prefix(env_keys::CONFIG_PREFIX)
            .separator("__")
            .source(Some(HashMap::new()))
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::load_with_environment_source(
            Some(dir.path().to_path_buf()),
            "test",
            empty_env(),
        )
        .unwrap();

        assert_eq!(manager.config(), &OrchestratorConfig::default());
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("avatar-batch.yaml"),
            "batch:\n  max_concurrent: 4\n  retry_attempts: 5\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("avatar-batch.production.yaml"),
            "batch:\n  max_concurrent: 8\n  required_prerequisites: [narrative, audio]\n",
        )
        .unwrap();

        let manager = ConfigManager::load_with_environment_source(
            Some(dir.path().to_path_buf()),
            "production",
            empty_env(),
        )
        .unwrap();

        let batch = &manager.config().batch;
        assert_eq!(batch.max_concurrent, 8);
        assert_eq!(batch.retry_attempts, 5);
        assert_eq!(
            batch.required_prerequisites,
            vec![PrerequisiteKind::Narrative, PrerequisiteKind::Audio]
        );
    }

    #[test]
    fn test_environment_variables_override_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("avatar-batch.yaml"),
            "batch:\n  max_concurrent: 4\n",
        )
        .unwrap();

        let vars = HashMap::from([(
            "AVATAR_BATCH__BATCH__MAX_CONCURRENT".to_string(),
            "11".to_string(),
        )]);
        let env_source = Environment::with_prefix(env_keys::CONFIG_PREFIX)
            .separator("__")
            .source(Some(vars));

        let manager = ConfigManager::load_with_environment_source(
            Some(dir.path().to_path_buf()),
            "development",
            env_source,
        )
        .unwrap();

        assert_eq!(manager.config().batch.max_concurrent, 11);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("avatar-batch.yaml"),
            "batch:\n  retry_attempts: 0\n",
        )
        .unwrap();

        let result = ConfigManager::load_with_environment_source(
            Some(dir.path().to_path_buf()),
            "development",
            empty_env(),
        );

        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_yaml_file_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = ConfigManager::from_yaml_file(&dir.path().join("nope.yaml"));
        assert!(matches!(result, Err(ConfigurationError::FileRead { .. })));
    }
}
