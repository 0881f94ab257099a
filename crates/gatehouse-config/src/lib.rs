//! Gatehouse configuration
//!
//! Loads [`GatewayConfig`] from an optional TOML file layered under
//! `GATEHOUSE__*` environment overrides, and validates the result.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::{ConfigManager, ENV_PREFIX};
pub use types::{
    ConfigStore, GatewayConfig, HistoryConfig, LoggingConfig, ProxyConfig, SessionConfig,
    TunnelConfig,
};
