//! Event types published on the gateway event bus

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tunnel::{CloseReason, TunnelDetails};

/// Session lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login produced a new session
    Created { session_id: Uuid, username: String },
    /// The session was destroyed on request (logout, revocation)
    Destroyed { session_id: Uuid, username: String },
    /// The session was removed by the idle sweeper
    Expired { session_id: Uuid, username: String },
}

/// Tunnel lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TunnelEvent {
    Opened(TunnelDetails),
    Closed {
        tunnel: TunnelDetails,
        reason: CloseReason,
    },
}
