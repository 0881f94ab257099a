//! Configuration manager implementation

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::debug;

use crate::{
    error::{ConfigError, Result},
    types::{ConfigStore, GatewayConfig},
};

/// Prefix of environment overrides, e.g. `GATEHOUSE__PROXY__PORT=4823`
pub const ENV_PREFIX: &str = "GATEHOUSE";

const LOG_FORMATS: [&str; 3] = ["full", "compact", "pretty"];

/// Configuration manager
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a manager reading `gatehouse.toml` in the working directory
    pub fn new() -> Self {
        Self::with_path(PathBuf::from("gatehouse.toml"))
    }

    /// Create with custom config path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Override the environment prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl ConfigStore for ConfigManager {
    fn load_config(&self) -> Result<GatewayConfig> {
        debug!(
            path = %self.config_path.display(),
            prefix = %self.env_prefix,
            "Loading configuration"
        );

        let builder = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let gateway_config: GatewayConfig = config.try_deserialize()?;
        self.validate_config(&gateway_config)?;
        Ok(gateway_config)
    }

    fn save_config(&self, config: &GatewayConfig) -> Result<()> {
        let toml = toml::to_string(config)?;
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }

    fn validate_config(&self, config: &GatewayConfig) -> Result<()> {
        if config.proxy.hostname.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Proxy hostname must not be empty".to_string(),
            ));
        }
        if config.proxy.port == 0 {
            return Err(ConfigError::Validation(
                "Proxy port must be greater than 0".to_string(),
            ));
        }
        if config.session.timeout_minutes == 0 {
            return Err(ConfigError::Validation(
                "Session timeout must be greater than 0".to_string(),
            ));
        }
        if config.session.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "Sweep interval must be greater than 0".to_string(),
            ));
        }
        if config.history.max_records == 0 {
            return Err(ConfigError::Validation(
                "History limit must be greater than 0".to_string(),
            ));
        }
        if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown log format: {}",
                config.logging.format
            )));
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
