//! Token-addressed session storage with idle expiry

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::RngCore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::{EventBus, GatewayEvent, SessionEvent};
use crate::session::Session;

/// Random bytes per session token
const TOKEN_BYTES: usize = 32;

/// Concurrent map from token to session
///
/// Lookups never block each other across tokens. A session found through
/// [`get`](Self::get) has been touched atomically with respect to expiry.
pub struct SessionStore {
    sessions: DashMap<String, Arc<Session>>,
    idle_timeout: Duration,
    bus: EventBus,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, bus: EventBus) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
            bus,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// A fresh, unguessable session token
    pub fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode_upper(bytes)
    }

    pub fn insert(&self, session: Arc<Session>) {
        info!(session_id = %session.id(), username = session.username(), "Session created");
        self.bus.publish(GatewayEvent::Session(SessionEvent::Created {
            session_id: session.id(),
            username: session.username().to_string(),
        }));
        self.sessions.insert(session.token().to_string(), session);
    }

    /// Look up and touch a live session
    pub fn get(&self, token: &str) -> Option<Arc<Session>> {
        let session = self.sessions.get(token)?.value().clone();
        if session.idle_time() >= self.idle_timeout || !session.touch() {
            return None;
        }
        Some(session)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Every session currently stored, live or not
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Destroy the session behind `token`, closing its tunnels first
    ///
    /// Returns whether a live session was destroyed.
    pub async fn destroy(&self, token: &str) -> bool {
        let Some(session) = self.sessions.get(token).map(|entry| entry.value().clone()) else {
            return false;
        };
        let Some(tunnels) = session.invalidate() else {
            return false;
        };

        session.close_tunnels(tunnels).await;
        self.sessions.remove(token);

        info!(session_id = %session.id(), username = session.username(), "Session destroyed");
        self.bus.publish(GatewayEvent::Session(SessionEvent::Destroyed {
            session_id: session.id(),
            username: session.username().to_string(),
        }));
        true
    }

    /// Remove every session idle for longer than the timeout
    ///
    /// Returns the number of sessions removed.
    pub async fn sweep(&self) -> usize {
        // Collect first; removing while iterating would deadlock the shard
        let candidates: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_time() >= self.idle_timeout)
            .map(|entry| entry.value().clone())
            .collect();

        let mut removed = 0;
        for session in candidates {
            // Re-checked under the session lock; a touch since may have won
            let Some(tunnels) = session.expire_if_idle(self.idle_timeout) else {
                continue;
            };

            session.close_tunnels(tunnels).await;
            self.sessions.remove(session.token());
            removed += 1;

            info!(session_id = %session.id(), username = session.username(), "Session expired");
            self.bus.publish(GatewayEvent::Session(SessionEvent::Expired {
                session_id: session.id(),
                username: session.username().to_string(),
            }));
        }

        if removed > 0 {
            debug!(removed, remaining = self.sessions.len(), "Idle sweep finished");
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `cancel` fires
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Session sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        store.sweep().await;
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}
