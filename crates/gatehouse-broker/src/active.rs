//! Process-wide registry of connections in use

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gatehouse_common::{GatewayError, Result};
use gatehouse_directory::ConnectionUsage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One open tunnel to a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveConnection {
    pub tunnel_id: Uuid,
    /// Provider whose directory holds the connection
    pub provider: String,
    pub connection_identifier: String,
    pub connection_name: String,
    pub username: String,
    pub remote_host: Option<String>,
    pub start_date: DateTime<Utc>,
}

/// Open tunnels, keyed by provider and connection identifier
#[derive(Debug, Default)]
pub struct ActiveConnectionMap {
    connections: DashMap<(String, String), Vec<ActiveConnection>>,
}

impl ActiveConnectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(provider: &str, identifier: &str) -> (String, String) {
        (provider.to_string(), identifier.to_string())
    }

    /// Claim a slot on a connection
    ///
    /// With `exclusive`, fails with `Conflict` if the connection already has
    /// an open tunnel. Check and insert happen under one shard lock.
    pub fn acquire(&self, connection: ActiveConnection, exclusive: bool) -> Result<()> {
        let key = Self::key(&connection.provider, &connection.connection_identifier);
        let mut entry = self.connections.entry(key).or_default();
        if exclusive && !entry.is_empty() {
            return Err(GatewayError::conflict(format!(
                "Connection \"{}\" is already in use",
                connection.connection_name
            )));
        }
        entry.push(connection);
        Ok(())
    }

    /// Give back the slot held by `tunnel_id`; returns whether it was held
    pub fn release(&self, provider: &str, identifier: &str, tunnel_id: &Uuid) -> bool {
        let key = Self::key(provider, identifier);
        let released = match self.connections.get_mut(&key) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|active| active.tunnel_id != *tunnel_id);
                entry.len() != before
            }
            None => false,
        };
        self.connections.remove_if(&key, |_, entry| entry.is_empty());
        released
    }

    pub fn count(&self, provider: &str, identifier: &str) -> usize {
        self.connections
            .get(&Self::key(provider, identifier))
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// Every open tunnel, in no particular order
    pub fn all(&self) -> Vec<ActiveConnection> {
        self.connections
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of open tunnels across all connections
    pub fn len(&self) -> usize {
        self.connections.iter().map(|entry| entry.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Usage counts for the connections of one provider
    pub fn usage<'a>(&'a self, provider: &'a str) -> ProviderUsage<'a> {
        ProviderUsage { map: self, provider }
    }
}

/// [`ConnectionUsage`] view restricted to one provider
pub struct ProviderUsage<'a> {
    map: &'a ActiveConnectionMap,
    provider: &'a str,
}

impl ConnectionUsage for ProviderUsage<'_> {
    fn active_count(&self, connection_identifier: &str) -> usize {
        self.map.count(self.provider, connection_identifier)
    }
}
