//! A logged-in user and the tunnels they hold open

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gatehouse_auth::{AuthenticatedUser, UserContext};
use gatehouse_common::{GatewayError, Result};
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::listener::ListenerNotifier;
use crate::tunnel::ManagedTunnel;

/// Mutable state guarded as one unit
///
/// Touching, expiring and registering tunnels all take this lock, so an idle
/// sweep can never race a request that is using the session.
struct SessionState {
    live: bool,
    last_access: Instant,
    tunnels: HashMap<Uuid, Arc<dyn ManagedTunnel>>,
}

/// An authenticated session, addressed by its token
pub struct Session {
    id: Uuid,
    token: String,
    user: AuthenticatedUser,
    contexts: RwLock<Vec<Arc<UserContext>>>,
    listeners: Arc<ListenerNotifier>,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        token: impl Into<String>,
        user: AuthenticatedUser,
        contexts: Vec<Arc<UserContext>>,
        listeners: Arc<ListenerNotifier>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: token.into(),
            user,
            contexts: RwLock::new(contexts),
            listeners,
            created_at: Utc::now(),
            state: Mutex::new(SessionState {
                live: true,
                last_access: Instant::now(),
                tunnels: HashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> &AuthenticatedUser {
        &self.user
    }

    pub fn username(&self) -> &str {
        &self.user.identifier
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn listeners(&self) -> &Arc<ListenerNotifier> {
        &self.listeners
    }

    /// Snapshot of the contexts contributed by each provider
    pub fn contexts(&self) -> Vec<Arc<UserContext>> {
        self.contexts.read().clone()
    }

    /// The context contributed by `provider`, if any
    pub fn context(&self, provider: &str) -> Option<Arc<UserContext>> {
        self.contexts
            .read()
            .iter()
            .find(|c| c.provider() == provider)
            .cloned()
    }

    pub fn set_contexts(&self, contexts: Vec<Arc<UserContext>>) {
        *self.contexts.write() = contexts;
    }

    pub fn is_live(&self) -> bool {
        self.state.lock().live
    }

    /// Record activity; returns `false` if the session is already closed
    pub fn touch(&self) -> bool {
        let mut state = self.state.lock();
        if !state.live {
            return false;
        }
        state.last_access = Instant::now();
        true
    }

    /// Time since the last touch
    pub fn idle_time(&self) -> Duration {
        self.state.lock().last_access.elapsed()
    }

    /// Register an open tunnel
    ///
    /// Fails once the session is closed, so a connect racing a logout cannot
    /// leave an orphaned tunnel behind.
    pub fn register_tunnel(&self, tunnel: Arc<dyn ManagedTunnel>) -> Result<()> {
        let mut state = self.state.lock();
        if !state.live {
            return Err(GatewayError::permission_denied("Session is no longer valid"));
        }
        state.tunnels.insert(tunnel.uuid(), tunnel);
        Ok(())
    }

    pub fn unregister_tunnel(&self, uuid: &Uuid) -> Option<Arc<dyn ManagedTunnel>> {
        self.state.lock().tunnels.remove(uuid)
    }

    pub fn tunnel(&self, uuid: &Uuid) -> Option<Arc<dyn ManagedTunnel>> {
        self.state.lock().tunnels.get(uuid).cloned()
    }

    pub fn tunnels(&self) -> Vec<Arc<dyn ManagedTunnel>> {
        self.state.lock().tunnels.values().cloned().collect()
    }

    pub fn tunnel_count(&self) -> usize {
        self.state.lock().tunnels.len()
    }

    /// Close the session, handing back the tunnels still registered
    ///
    /// Returns `None` if it was already closed.
    pub(crate) fn invalidate(&self) -> Option<Vec<Arc<dyn ManagedTunnel>>> {
        let mut state = self.state.lock();
        Self::retire(&mut state)
    }

    /// Close the session only if it has been idle for at least `timeout`
    pub(crate) fn expire_if_idle(&self, timeout: Duration) -> Option<Vec<Arc<dyn ManagedTunnel>>> {
        let mut state = self.state.lock();
        if state.last_access.elapsed() < timeout {
            return None;
        }
        Self::retire(&mut state)
    }

    fn retire(state: &mut SessionState) -> Option<Vec<Arc<dyn ManagedTunnel>>> {
        if !state.live {
            return None;
        }
        state.live = false;
        Some(state.tunnels.drain().map(|(_, tunnel)| tunnel).collect())
    }

    /// Close tunnels handed back by [`invalidate`](Self::invalidate)
    ///
    /// Runs without holding any session lock.
    pub(crate) async fn close_tunnels(&self, tunnels: Vec<Arc<dyn ManagedTunnel>>) {
        for tunnel in tunnels {
            debug!(
                session_id = %self.id,
                tunnel_id = %tunnel.uuid(),
                "Closing tunnel for session teardown"
            );
            tunnel.teardown().await;
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.user.identifier)
            .field("provider", &self.user.provider)
            .field("created_at", &self.created_at)
            .finish()
    }
}
