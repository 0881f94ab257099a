//! A live proxied session and its close protocol

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_common::Result;
use gatehouse_directory::{ConnectionRecord, HistoryStore, RecordId};
use gatehouse_sessions::{
    CloseOutcome, CloseReason, EventBus, GatewayEvent, ListenerEvent, ListenerNotifier,
    ManagedTunnel, Session, TunnelDetails, TunnelEvent,
};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::active::ActiveConnectionMap;
use crate::socket::ProxySocket;

/// Lifecycle of a tunnel
///
/// `Resolving` and `Opening` cover the connect attempt; a tunnel that never
/// opens ends in `Failed` and leaves no history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Resolving,
    Opening,
    Open,
    Closing,
    Closed,
    Failed,
}

impl TunnelState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A proxied session between a caller and the proxy daemon
///
/// All state transitions take the tunnel's own lock, so concurrent closes
/// release the socket, the active slot and the history record exactly once.
pub struct Tunnel {
    details: TunnelDetails,
    provider: String,
    remote_host: Option<String>,
    opened_at: DateTime<Utc>,
    socket: Box<dyn ProxySocket>,
    state: Mutex<TunnelState>,
    session: Weak<Session>,
    listeners: Arc<ListenerNotifier>,
    active: Arc<ActiveConnectionMap>,
    history: SyncMutex<Option<(Arc<dyn HistoryStore>, RecordId)>>,
    bus: EventBus,
}

impl Tunnel {
    pub(crate) fn new(
        details: TunnelDetails,
        provider: String,
        remote_host: Option<String>,
        socket: Box<dyn ProxySocket>,
        session: &Arc<Session>,
        active: Arc<ActiveConnectionMap>,
        bus: EventBus,
    ) -> Arc<Self> {
        Arc::new(Self {
            details,
            provider,
            remote_host,
            opened_at: Utc::now(),
            socket,
            state: Mutex::new(TunnelState::Opening),
            session: Arc::downgrade(session),
            listeners: session.listeners().clone(),
            active,
            history: SyncMutex::new(None),
            bus,
        })
    }

    pub fn uuid(&self) -> Uuid {
        self.details.tunnel_id
    }

    pub fn details(&self) -> &TunnelDetails {
        &self.details
    }

    pub fn connection_identifier(&self) -> &str {
        &self.details.connection_identifier
    }

    pub fn username(&self) -> &str {
        &self.details.username
    }

    /// Provider whose directory holds the connection
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn socket(&self) -> &dyn ProxySocket {
        self.socket.as_ref()
    }

    pub async fn state(&self) -> TunnelState {
        *self.state.lock().await
    }

    pub async fn is_open(&self) -> bool {
        self.state().await == TunnelState::Open
    }

    /// Register with the session and start the history record
    ///
    /// On failure everything acquired so far is released and the tunnel
    /// ends in `Failed`.
    pub(crate) async fn activate(
        self: &Arc<Self>,
        session: &Session,
        history: Option<Arc<dyn HistoryStore>>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let managed: Arc<dyn ManagedTunnel> = self.clone();
        if let Err(e) = session.register_tunnel(managed) {
            self.release_resources().await;
            *state = TunnelState::Failed;
            return Err(e);
        }

        if let Some(store) = history {
            let record = ConnectionRecord {
                connection_identifier: self.details.connection_identifier.clone(),
                connection_name: self.details.connection_name.clone(),
                username: self.details.username.clone(),
                remote_host: self.remote_host.clone(),
                start_date: self.opened_at,
                end_date: None,
            };
            match store.insert(record) {
                Ok(id) => *self.history.lock() = Some((store, id)),
                Err(e) => {
                    session.unregister_tunnel(&self.uuid());
                    self.release_resources().await;
                    *state = TunnelState::Failed;
                    return Err(e);
                }
            }
        }

        *state = TunnelState::Open;
        Ok(())
    }

    /// Abandon a tunnel that never opened
    pub(crate) async fn abort(&self) {
        let mut state = self.state.lock().await;
        if state.is_terminal() {
            return;
        }
        self.release_resources().await;
        *state = TunnelState::Failed;
    }

    async fn release_resources(&self) {
        if let Err(e) = self.socket.close().await {
            warn!(tunnel_id = %self.uuid(), error = %e, "Failed to close proxy socket");
        }
        self.active
            .release(&self.provider, &self.details.connection_identifier, &self.uuid());
    }
}

#[async_trait]
impl ManagedTunnel for Tunnel {
    fn uuid(&self) -> Uuid {
        self.details.tunnel_id
    }

    fn details(&self) -> TunnelDetails {
        self.details.clone()
    }

    async fn close(&self, reason: CloseReason) -> Result<CloseOutcome> {
        let mut state = self.state.lock().await;
        if *state != TunnelState::Open {
            return Ok(CloseOutcome::AlreadyClosed);
        }

        let event = ListenerEvent::TunnelClose {
            tunnel: self.details.clone(),
            reason,
        };
        if !self.listeners.notify(&event) {
            info!(tunnel_id = %self.uuid(), "Tunnel close vetoed by listener");
            return Ok(CloseOutcome::Vetoed);
        }

        *state = TunnelState::Closing;
        self.release_resources().await;
        if let Some(session) = self.session.upgrade() {
            session.unregister_tunnel(&self.uuid());
        }

        let ended = Utc::now();
        let history = self.history.lock().take();
        if let Some((store, id)) = history {
            if let Err(e) = store.finish(id, ended) {
                warn!(
                    tunnel_id = %self.uuid(),
                    record = id,
                    error = %e,
                    "Failed to finish history record"
                );
            }
        }

        *state = TunnelState::Closed;
        info!(
            tunnel_id = %self.uuid(),
            connection = %self.details.connection_identifier,
            username = %self.details.username,
            reason = %reason,
            duration_ms = (ended - self.opened_at).num_milliseconds(),
            "Tunnel closed"
        );
        self.bus.publish(GatewayEvent::Tunnel(TunnelEvent::Closed {
            tunnel: self.details.clone(),
            reason,
        }));
        Ok(CloseOutcome::Closed)
    }
}

impl fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("details", &self.details)
            .field("provider", &self.provider)
            .field("opened_at", &self.opened_at)
            .finish()
    }
}
