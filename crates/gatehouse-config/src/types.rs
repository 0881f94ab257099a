//! Configuration types and defaults

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Complete gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Backend proxy daemon
    pub proxy: ProxyConfig,
    /// Session lifecycle
    pub session: SessionConfig,
    /// Tunnel restrictions
    pub tunnel: TunnelConfig,
    /// Connection history
    pub history: HistoryConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Where the proxy daemon listens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Hostname of the proxy daemon
    pub hostname: String,
    /// Port of the proxy daemon
    pub port: u16,
    /// Socket connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle minutes before a session expires
    pub timeout_minutes: u64,
    /// Seconds between idle sweeps
    pub sweep_interval_secs: u64,
}

/// Tunnel settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TunnelConfig {
    /// Refuse a connection that already has an open tunnel
    pub disallow_simultaneous_connections: bool,
}

/// History settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Upper bound on records returned by a history query
    pub max_records: usize,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// One of `full`, `compact` or `pretty`
    pub format: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 4822,
            connect_timeout_ms: 15_000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 60,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_records: 100 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

impl ProxyConfig {
    /// `hostname:port` of the proxy daemon
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Loads, saves and validates gateway configuration
pub trait ConfigStore {
    /// Load configuration from all sources
    fn load_config(&self) -> Result<GatewayConfig>;

    /// Persist configuration to the backing file
    fn save_config(&self, config: &GatewayConfig) -> Result<()>;

    /// Check configuration for values the gateway cannot run with
    fn validate_config(&self, config: &GatewayConfig) -> Result<()>;
}
