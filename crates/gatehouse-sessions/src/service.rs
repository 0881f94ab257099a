//! Login, logout and per-request session resolution

use std::sync::Arc;

use gatehouse_auth::{AuthenticationChain, Credentials};
use gatehouse_common::{GatewayError, Result};
use tracing::{info, warn};

use crate::listener::{ListenerEvent, ListenerNotifier};
use crate::session::Session;
use crate::store::SessionStore;

/// Turns credentials into session tokens
pub struct AuthenticationService {
    chain: AuthenticationChain,
    store: Arc<SessionStore>,
    listeners: Arc<ListenerNotifier>,
}

impl AuthenticationService {
    pub fn new(
        chain: AuthenticationChain,
        store: Arc<SessionStore>,
        listeners: Arc<ListenerNotifier>,
    ) -> Self {
        Self {
            chain,
            store,
            listeners,
        }
    }

    pub fn chain(&self) -> &AuthenticationChain {
        &self.chain
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Authenticate a request, returning the session token to use
    ///
    /// With a valid `token`, the existing session's contexts are refreshed
    /// and the same token is returned; if every provider revokes its context,
    /// or a listener vetoes the renewed login, the session is destroyed.
    /// Otherwise the chain runs and, unless a listener vetoes the login, a
    /// new session is created.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        token: Option<&str>,
    ) -> Result<String> {
        if let Some(token) = token {
            if let Some(session) = self.store.get(token) {
                return self.refresh(&session, credentials).await;
            }
        }

        let result = match self.chain.authenticate(credentials).await {
            Ok(result) => result,
            Err(e) => {
                self.listeners.notify_advisory(&ListenerEvent::AuthenticationFailure {
                    username: credentials.username.clone(),
                    error: e.clone(),
                });
                return Err(e);
            }
        };

        let accepted = self.listeners.notify_vetoable(&ListenerEvent::AuthenticationSuccess {
            username: result.user.identifier.clone(),
            provider: result.user.provider.clone(),
        });
        if !accepted {
            info!(username = %result.user.identifier, "Login cancelled by listener");
            return Err(GatewayError::permission_denied("Authentication was cancelled"));
        }

        let token = SessionStore::generate_token();
        let session = Arc::new(Session::new(
            token.clone(),
            result.user,
            result.contexts,
            self.listeners.clone(),
        ));
        self.store.insert(session);
        Ok(token)
    }

    async fn refresh(&self, session: &Arc<Session>, credentials: &Credentials) -> Result<String> {
        let contexts = self
            .chain
            .update_user_contexts(session.user(), &session.contexts(), credentials)
            .await?;

        if contexts.is_empty() {
            warn!(username = session.username(), "Every context revoked; destroying session");
            self.store.destroy(session.token()).await;
            return Err(GatewayError::permission_denied("Session is no longer valid"));
        }

        session.set_contexts(contexts);

        let accepted = self.listeners.notify_vetoable(&ListenerEvent::AuthenticationSuccess {
            username: session.username().to_string(),
            provider: session.user().provider.clone(),
        });
        if !accepted {
            info!(username = session.username(), "Session refresh cancelled by listener");
            self.store.destroy(session.token()).await;
            return Err(GatewayError::permission_denied("Authentication was cancelled"));
        }
        Ok(session.token().to_string())
    }

    /// Destroy the session behind `token` and close its tunnels
    pub async fn logout(&self, token: &str) -> Result<()> {
        if self.store.destroy(token).await {
            Ok(())
        } else {
            Err(GatewayError::permission_denied("Invalid session"))
        }
    }

    /// The live session behind `token`, touched
    pub fn session(&self, token: &str) -> Result<Arc<Session>> {
        self.store
            .get(token)
            .ok_or_else(|| GatewayError::permission_denied("Invalid session"))
    }
}
