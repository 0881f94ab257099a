//! Ordered evaluation of authentication providers

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    context::UserContext,
    credentials::{AuthenticatedUser, Credentials},
    provider::AuthenticationProvider,
    GatewayError, Result,
};

/// Outcome of a successful login
#[derive(Debug)]
pub struct AuthenticationResult {
    pub user: AuthenticatedUser,
    /// One context per contributing provider, in provider order
    pub contexts: Vec<Arc<UserContext>>,
}

/// Providers in declared order
#[derive(Clone, Default)]
pub struct AuthenticationChain {
    providers: Vec<Arc<dyn AuthenticationProvider>>,
}

impl AuthenticationChain {
    pub fn new(providers: Vec<Arc<dyn AuthenticationProvider>>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[Arc<dyn AuthenticationProvider>] {
        &self.providers
    }

    pub fn provider(&self, identifier: &str) -> Option<&Arc<dyn AuthenticationProvider>> {
        self.providers.iter().find(|p| p.identifier() == identifier)
    }

    /// Authenticate `credentials` and collect every provider's context
    ///
    /// The first provider returning a user wins. Credential errors from a
    /// provider are remembered while later providers are tried; if nobody
    /// authenticates, the first of them is returned, otherwise a plain
    /// denial. Any other error aborts immediately.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticationResult> {
        let user = self.authenticate_user(credentials).await?;

        let mut contexts = Vec::new();
        for provider in &self.providers {
            if let Some(context) = provider.get_user_context(&user).await? {
                debug!(
                    provider = provider.identifier(),
                    username = %user.identifier,
                    "Context contributed"
                );
                contexts.push(Arc::new(context));
            }
        }

        if contexts.is_empty() {
            warn!(username = %user.identifier, "Authenticated user has no context in any provider");
            return Err(GatewayError::permission_denied("Invalid login"));
        }

        info!(
            username = %user.identifier,
            provider = %user.provider,
            contexts = contexts.len(),
            "User authenticated"
        );
        Ok(AuthenticationResult { user, contexts })
    }

    async fn authenticate_user(&self, credentials: &Credentials) -> Result<AuthenticatedUser> {
        let mut credential_error = None;

        for provider in &self.providers {
            match provider.authenticate_user(credentials).await {
                Ok(Some(user)) => return Ok(user),
                Ok(None) => {}
                Err(e) if e.is_credential_error() => {
                    debug!(
                        provider = provider.identifier(),
                        error = %e,
                        "Provider rejected credentials"
                    );
                    credential_error.get_or_insert(e);
                }
                Err(e) => {
                    warn!(provider = provider.identifier(), error = %e, "Provider failed");
                    return Err(e);
                }
            }
        }

        Err(credential_error.unwrap_or_else(|| GatewayError::permission_denied("Invalid login")))
    }

    /// Refresh every context of an existing login
    ///
    /// Contexts whose provider returns `None`, or whose provider is no longer
    /// in the chain, are dropped. An empty result means the login as a whole
    /// is no longer authenticated.
    pub async fn update_user_contexts(
        &self,
        user: &AuthenticatedUser,
        contexts: &[Arc<UserContext>],
        credentials: &Credentials,
    ) -> Result<Vec<Arc<UserContext>>> {
        let mut updated = Vec::with_capacity(contexts.len());

        for context in contexts {
            let Some(provider) = self.provider(context.provider()) else {
                continue;
            };
            match provider
                .update_user_context(context.clone(), user, credentials)
                .await?
            {
                Some(context) => updated.push(context),
                None => info!(
                    provider = provider.identifier(),
                    username = %user.identifier,
                    "Provider revoked its context"
                ),
            }
        }

        Ok(updated)
    }
}
