//! Tunnel brokering for gatehouse
//!
//! A [`TunnelRequest`] names a connection (`c/<id>`) or a balancing group
//! (`g/<id>`). The [`TunnelBroker`] resolves it through the session's
//! contexts, claims a slot in the [`ActiveConnectionMap`], opens a proxy
//! socket, lets listeners veto, and registers the resulting [`Tunnel`] with
//! the session. Closing a tunnel is idempotent and finishes its history
//! record exactly once.

pub mod active;
pub mod broker;
pub mod gateway;
pub mod request;
pub mod socket;
pub mod tunnel;

pub use active::{ActiveConnection, ActiveConnectionMap, ProviderUsage};
pub use broker::{ConnectOutcome, TunnelBroker};
pub use gateway::{directory_from_config, Gateway};
pub use request::{ClientInfo, TunnelRequest, TunnelTarget, CONNECTION_PREFIX, GROUP_PREFIX};
pub use socket::{ProxySocket, ProxySocketFactory, TcpProxySocket, TcpProxySocketFactory};
pub use tunnel::{Tunnel, TunnelState};

pub use gatehouse_sessions::{CloseOutcome, CloseReason, ManagedTunnel};
