//! The part of a tunnel a session needs to know about

use std::fmt;

use async_trait::async_trait;
use gatehouse_common::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Why a tunnel is being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The caller asked for it; listeners may veto
    Caller,
    /// The owning session is being destroyed
    Teardown,
    /// The proxied socket failed
    SocketFailure,
}

impl CloseReason {
    /// Whether listeners may refuse a close for this reason
    pub fn is_vetoable(self) -> bool {
        matches!(self, Self::Caller)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caller => write!(f, "caller"),
            Self::Teardown => write!(f, "teardown"),
            Self::SocketFailure => write!(f, "socket failure"),
        }
    }
}

/// Result of asking a tunnel to close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// This call released the tunnel
    Closed,
    /// Someone else closed it first
    AlreadyClosed,
    /// A listener refused a caller close; the tunnel stays open
    Vetoed,
}

/// Identifying details of a tunnel, as seen by listeners and observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelDetails {
    pub tunnel_id: Uuid,
    pub connection_identifier: String,
    pub connection_name: String,
    pub username: String,
}

/// A tunnel registered under a session
///
/// Sessions only hold tunnels so they can release them when the session
/// goes away; everything else about a tunnel lives with the broker.
#[async_trait]
pub trait ManagedTunnel: Send + Sync {
    fn uuid(&self) -> Uuid;

    fn details(&self) -> TunnelDetails;

    /// Close the tunnel
    ///
    /// Idempotent: only the first successful call releases anything. Closes
    /// for reasons other than [`CloseReason::Caller`] cannot be vetoed.
    async fn close(&self, reason: CloseReason) -> Result<CloseOutcome>;

    /// Close the tunnel because its session is being destroyed
    async fn teardown(&self) {
        if let Err(e) = self.close(CloseReason::Teardown).await {
            warn!(tunnel_id = %self.uuid(), error = %e, "Tunnel teardown failed");
        }
    }
}
