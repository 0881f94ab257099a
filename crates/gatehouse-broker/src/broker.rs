//! Turns tunnel requests into open tunnels

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use gatehouse_auth::UserContext;
use gatehouse_common::{ErrorKind, GatewayError, Result};
use gatehouse_directory::{BalancingPolicy, Connection, DirectoryObject, LeastActivePolicy};
use gatehouse_sessions::{
    CloseOutcome, CloseReason, EventBus, GatewayEvent, ListenerEvent, ManagedTunnel, Session,
    TunnelDetails, TunnelEvent,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::active::{ActiveConnection, ActiveConnectionMap};
use crate::request::{TunnelRequest, TunnelTarget};
use crate::socket::ProxySocketFactory;
use crate::tunnel::{Tunnel, TunnelState};

/// Result of a connect attempt that did not fail outright
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Connected(Arc<Tunnel>),
    /// A listener vetoed the connect; nothing was registered
    Cancelled,
}

impl ConnectOutcome {
    pub fn tunnel(&self) -> Option<&Arc<Tunnel>> {
        match self {
            Self::Connected(tunnel) => Some(tunnel),
            Self::Cancelled => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Where a request resolved to
struct Resolution {
    context: Arc<UserContext>,
    candidates: Vec<Connection>,
}

/// Opens and closes tunnels on behalf of sessions
pub struct TunnelBroker {
    sockets: Arc<dyn ProxySocketFactory>,
    active: Arc<ActiveConnectionMap>,
    balancing: Arc<dyn BalancingPolicy>,
    disallow_simultaneous: bool,
    bus: EventBus,
}

impl TunnelBroker {
    pub fn new(sockets: Arc<dyn ProxySocketFactory>, bus: EventBus) -> Self {
        Self {
            sockets,
            active: Arc::new(ActiveConnectionMap::new()),
            balancing: Arc::new(LeastActivePolicy),
            disallow_simultaneous: false,
            bus,
        }
    }

    pub fn with_balancing_policy(mut self, policy: Arc<dyn BalancingPolicy>) -> Self {
        self.balancing = policy;
        self
    }

    /// Refuse a second tunnel to a connection that is already in use
    pub fn with_simultaneous_connections_disallowed(mut self, disallow: bool) -> Self {
        self.disallow_simultaneous = disallow;
        self
    }

    pub fn active(&self) -> &Arc<ActiveConnectionMap> {
        &self.active
    }

    /// Open a tunnel for `request` within `session`
    ///
    /// Permission failures and unknown targets are both `NotFound`. A listener
    /// veto yields [`ConnectOutcome::Cancelled`] with the socket already
    /// closed.
    pub async fn connect(
        &self,
        session: &Arc<Session>,
        request: &TunnelRequest,
    ) -> Result<ConnectOutcome> {
        let target = request.target()?;
        let client_info = request.client_info()?;
        debug!(
            username = session.username(),
            target = %target,
            state = %TunnelState::Resolving,
            "Resolving tunnel target"
        );

        let Resolution { context, candidates } = self.resolve(session, request, &target)?;
        let candidates = if target.is_group() {
            self.balancing
                .rank(candidates, &self.active.usage(context.provider()))
        } else {
            candidates
        };
        let (connection, slot) = self.acquire(session, request, &context, candidates)?;

        debug!(
            tunnel_id = %slot.tunnel_id,
            connection = %slot.connection_identifier,
            state = %TunnelState::Opening,
            "Opening proxy socket"
        );
        let socket = match self.sockets.open(&connection, &client_info).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!(
                    tunnel_id = %slot.tunnel_id,
                    connection = %slot.connection_identifier,
                    error = %e,
                    "Tunnel failed to open"
                );
                self.active
                    .release(&slot.provider, &slot.connection_identifier, &slot.tunnel_id);
                return Err(e);
            }
        };

        let details = TunnelDetails {
            tunnel_id: slot.tunnel_id,
            connection_identifier: slot.connection_identifier.clone(),
            connection_name: slot.connection_name.clone(),
            username: slot.username.clone(),
        };
        let tunnel = Tunnel::new(
            details.clone(),
            slot.provider.clone(),
            slot.remote_host.clone(),
            socket,
            session,
            self.active.clone(),
            self.bus.clone(),
        );

        let event = ListenerEvent::TunnelConnect(details.clone());
        if !session.listeners().notify_vetoable(&event) {
            info!(tunnel_id = %details.tunnel_id, "Tunnel connect vetoed by listener");
            tunnel.abort().await;
            return Ok(ConnectOutcome::Cancelled);
        }

        let history = context.directory().tree.history_store().cloned();
        tunnel.activate(session, history).await?;

        info!(
            tunnel_id = %details.tunnel_id,
            connection = %details.connection_identifier,
            username = %details.username,
            provider = %slot.provider,
            "Tunnel opened"
        );
        self.bus.publish(GatewayEvent::Tunnel(TunnelEvent::Opened(details)));
        Ok(ConnectOutcome::Connected(tunnel))
    }

    /// Find the first context in which the target is readable and usable
    fn resolve(
        &self,
        session: &Session,
        request: &TunnelRequest,
        target: &TunnelTarget,
    ) -> Result<Resolution> {
        let contexts = match &request.data_source {
            Some(data_source) => session.context(data_source).into_iter().collect(),
            None => session.contexts(),
        };

        let mut denied = None;
        for context in contexts {
            let tree = &context.directory().tree;
            let subject = context.subject();
            let found = match target {
                TunnelTarget::Connection(id) => tree.connection(subject, id).map(|c| vec![c]),
                TunnelTarget::ConnectionGroup(id) => tree.balancing_candidates(subject, id),
            };
            match found {
                Ok(candidates) => return Ok(Resolution { context, candidates }),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    debug!(provider = context.provider(), error = %e, "Target refused by context");
                    denied.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(denied.unwrap_or_else(|| {
            GatewayError::not_found(format!("Requested tunnel target {} is not authorized", target))
        }))
    }

    /// Claim an active slot on the first candidate that has one free
    fn acquire(
        &self,
        session: &Session,
        request: &TunnelRequest,
        context: &UserContext,
        candidates: Vec<Connection>,
    ) -> Result<(Connection, ActiveConnection)> {
        let mut conflict = None;

        for connection in candidates {
            let identifier = connection
                .identifier()
                .ok_or_else(|| GatewayError::internal("Stored connection without identifier"))?
                .to_string();
            let slot = ActiveConnection {
                tunnel_id: Uuid::new_v4(),
                provider: context.provider().to_string(),
                connection_identifier: identifier,
                connection_name: connection.name.clone(),
                username: session.username().to_string(),
                remote_host: request.remote_host.clone(),
                start_date: Utc::now(),
            };
            match self.active.acquire(slot.clone(), self.disallow_simultaneous) {
                Ok(()) => return Ok((connection, slot)),
                Err(e) if e.kind() == ErrorKind::Conflict => {
                    debug!(connection = %slot.connection_identifier, "Connection busy");
                    conflict.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(conflict
            .unwrap_or_else(|| GatewayError::not_found("No connection available in group")))
    }

    /// Caller-initiated close of a tunnel owned by `session`
    pub async fn close(&self, session: &Session, tunnel_id: &Uuid) -> Result<CloseOutcome> {
        let tunnel = session
            .tunnel(tunnel_id)
            .ok_or_else(|| GatewayError::not_found(format!("Tunnel {} not found", tunnel_id)))?;
        tunnel.close(CloseReason::Caller).await
    }

    /// Open tunnels on connections the session may read
    pub fn active_connections(&self, session: &Session) -> Result<Vec<ActiveConnection>> {
        let all = self.active.all();
        let mut visible = Vec::new();

        for context in session.contexts() {
            let entries: Vec<_> = all
                .iter()
                .filter(|active| active.provider == context.provider())
                .cloned()
                .collect();
            if entries.is_empty() {
                continue;
            }

            let identifiers: HashSet<String> = entries
                .iter()
                .map(|active| active.connection_identifier.clone())
                .collect();
            let readable = context
                .directory()
                .connections
                .readable(context.subject(), &identifiers)?;
            visible.extend(
                entries
                    .into_iter()
                    .filter(|active| readable.contains(&active.connection_identifier)),
            );
        }

        Ok(visible)
    }
}
