//! Tunnel requests: which object to connect to, and how the client looks

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use gatehouse_common::{GatewayError, Result};
use serde::{Deserialize, Serialize};

/// Prefix of identifiers naming a connection
pub const CONNECTION_PREFIX: &str = "c/";

/// Prefix of identifiers naming a connection group
pub const GROUP_PREFIX: &str = "g/";

/// The object a tunnel request names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TunnelTarget {
    Connection(String),
    ConnectionGroup(String),
}

impl TunnelTarget {
    /// Parse a prefixed identifier such as `c/42` or `g/ROOT`
    pub fn parse(value: &str) -> Result<Self> {
        let (target, identifier) = if let Some(id) = value.strip_prefix(CONNECTION_PREFIX) {
            (Self::Connection(id.to_string()), id)
        } else if let Some(id) = value.strip_prefix(GROUP_PREFIX) {
            (Self::ConnectionGroup(id.to_string()), id)
        } else {
            return Err(GatewayError::invalid(format!(
                "Unknown tunnel target \"{}\": expected \"{}\" or \"{}\" prefix",
                value, CONNECTION_PREFIX, GROUP_PREFIX
            )));
        };

        if identifier.is_empty() {
            return Err(GatewayError::invalid("Tunnel target has an empty identifier"));
        }
        Ok(target)
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::Connection(id) | Self::ConnectionGroup(id) => id,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::ConnectionGroup(_))
    }
}

impl FromStr for TunnelTarget {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TunnelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(id) => write!(f, "{}{}", CONNECTION_PREFIX, id),
            Self::ConnectionGroup(id) => write!(f, "{}{}", GROUP_PREFIX, id),
        }
    }
}

/// Display and media capabilities the client announced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub audio_mimetypes: Vec<String>,
    pub video_mimetypes: Vec<String>,
    pub image_mimetypes: Vec<String>,
    pub timezone: Option<String>,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            dpi: 96,
            audio_mimetypes: Vec::new(),
            video_mimetypes: Vec::new(),
            image_mimetypes: Vec::new(),
            timezone: None,
        }
    }
}

impl ClientInfo {
    /// Read client capabilities from request parameters
    ///
    /// Missing values keep their defaults; malformed numbers are rejected.
    pub fn from_parameters(parameters: &HashMap<String, Vec<String>>) -> Result<Self> {
        let first = |name: &str| parameters.get(name).and_then(|v| v.first());
        let all = |name: &str| parameters.get(name).cloned().unwrap_or_default();
        let number = |name: &str, default: u32| -> Result<u32> {
            match first(name) {
                None => Ok(default),
                Some(raw) => raw.trim().parse::<NonZeroU32>().map(NonZeroU32::get).map_err(|_| {
                    GatewayError::invalid(format!(
                        "Parameter \"{}\" must be a positive integer, got \"{}\"",
                        name, raw
                    ))
                }),
            }
        };

        let defaults = Self::default();
        Ok(Self {
            width: number("width", defaults.width)?,
            height: number("height", defaults.height)?,
            dpi: number("dpi", defaults.dpi)?,
            audio_mimetypes: all("audio"),
            video_mimetypes: all("video"),
            image_mimetypes: all("image"),
            timezone: first("timezone").cloned(),
        })
    }
}

/// A request to open a tunnel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelRequest {
    /// Prefixed identifier of the target
    pub identifier: String,
    /// Provider whose directory holds the target; any context if absent
    pub data_source: Option<String>,
    pub remote_host: Option<String>,
    pub parameters: HashMap<String, Vec<String>>,
}

impl TunnelRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    pub fn with_remote_host(mut self, host: impl Into<String>) -> Self {
        self.remote_host = Some(host.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn target(&self) -> Result<TunnelTarget> {
        TunnelTarget::parse(&self.identifier)
    }

    pub fn client_info(&self) -> Result<ClientInfo> {
        ClientInfo::from_parameters(&self.parameters)
    }
}
