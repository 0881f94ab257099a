//! The authentication provider interface

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    context::UserContext,
    credentials::{AuthenticatedUser, Credentials},
    Result,
};

/// A source of identities and directories
///
/// Credential failures are reported as `Invalid` or
/// `InsufficientCredentials`; the chain then moves on to the next provider.
/// `Unavailable` aborts the whole attempt.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Stable identifier, also used as the data source name of its contexts
    fn identifier(&self) -> &str;

    /// Recognise the user behind `credentials`, or `None` to pass
    async fn authenticate_user(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<AuthenticatedUser>>;

    /// This provider's view for a user any provider authenticated
    async fn get_user_context(&self, user: &AuthenticatedUser) -> Result<Option<UserContext>>;

    /// Refresh a context on a later request; `None` revokes it
    async fn update_user_context(
        &self,
        context: Arc<UserContext>,
        _user: &AuthenticatedUser,
        _credentials: &Credentials,
    ) -> Result<Option<Arc<UserContext>>> {
        Ok(Some(context))
    }
}
