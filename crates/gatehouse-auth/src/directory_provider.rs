//! Authentication against a gatehouse directory
//!
//! Users log in with the password stored in the directory. A user flagged as
//! expired must choose a new password within the same attempt: until both
//! the new password and its confirmation are supplied, authentication fails
//! with `InsufficientCredentials` naming those two fields.

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_common::{Field, FieldType};
use gatehouse_directory::{Directory, PasswordEncryption, User};
use tracing::{debug, info, warn};

use crate::{
    context::{Form, UserContext},
    credentials::{AuthenticatedUser, Credentials},
    provider::AuthenticationProvider,
    GatewayError, Result,
};

/// Parameter carrying the replacement for an expired password
pub const NEW_PASSWORD_PARAMETER: &str = "new-password";

/// Parameter carrying the confirmation of the replacement password
pub const CONFIRM_NEW_PASSWORD_PARAMETER: &str = "confirm-new-password";

pub const PASSWORD_SAME: &str = "The new password must differ from the current password";
pub const PASSWORD_BLANK: &str = "The new password must not be blank";
pub const PASSWORD_MISMATCH: &str = "The new password and its confirmation do not match";

/// Provider backed by a [`Directory`]
pub struct DirectoryAuthenticationProvider {
    identifier: String,
    directory: Arc<Directory>,
    hasher: Arc<dyn PasswordEncryption>,
}

impl DirectoryAuthenticationProvider {
    pub fn new(
        identifier: impl Into<String>,
        directory: Arc<Directory>,
        hasher: Arc<dyn PasswordEncryption>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            directory,
            hasher,
        }
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    fn expired_password_fields() -> Vec<Field> {
        vec![
            Field::password(NEW_PASSWORD_PARAMETER),
            Field::password(CONFIRM_NEW_PASSWORD_PARAMETER),
        ]
    }

    /// Replace the expired password of `user` with the one in `credentials`
    fn reset_expired_password(
        &self,
        mut user: User,
        current_password: &str,
        credentials: &Credentials,
    ) -> Result<()> {
        let new_password = credentials.parameter(NEW_PASSWORD_PARAMETER);
        let confirmation = credentials.parameter(CONFIRM_NEW_PASSWORD_PARAMETER);

        let (Some(new_password), Some(confirmation)) = (new_password, confirmation) else {
            info!(username = %user.username, "Password expired; requesting a new one");
            return Err(GatewayError::insufficient_credentials(
                "Password expired. Please set a new password.",
                Self::expired_password_fields(),
            ));
        };

        if new_password == current_password {
            return Err(GatewayError::invalid(PASSWORD_SAME));
        }
        if new_password.is_empty() {
            return Err(GatewayError::invalid(PASSWORD_BLANK));
        }
        if new_password != confirmation {
            return Err(GatewayError::invalid(PASSWORD_MISMATCH));
        }

        user.password_hash = Some(self.hasher.hash(new_password)?);
        user.set_expired(false);
        self.directory.stores().users.update(&user)?;
        info!(username = %user.username, "Expired password replaced");
        Ok(())
    }

    fn context_for(&self, username: &str) -> UserContext {
        UserContext::new(
            self.identifier.clone(),
            username,
            Arc::new(self.directory.subject(username)),
            self.directory.clone(),
        )
        .with_user_attributes(vec![Form::new(
            "restrictions",
            vec![
                Field::new("disabled", FieldType::Boolean),
                Field::new("expired", FieldType::Boolean),
            ],
        )])
    }
}

#[async_trait]
impl AuthenticationProvider for DirectoryAuthenticationProvider {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn authenticate_user(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<AuthenticatedUser>> {
        let (Some(username), Some(password)) = (&credentials.username, &credentials.password) else {
            return Ok(None);
        };
        if username.is_empty() {
            return Ok(None);
        }

        let Some(user) = self.directory.stores().users.select_one(username)? else {
            debug!(provider = %self.identifier, username = %username, "Unknown user");
            return Ok(None);
        };
        if user.disabled {
            warn!(
                provider = %self.identifier,
                username = %username,
                "Login attempt for disabled user"
            );
            return Ok(None);
        }
        let Some(hash) = user.password_hash.as_deref() else {
            return Ok(None);
        };
        if !self.hasher.verify(password, hash)? {
            debug!(provider = %self.identifier, username = %username, "Password mismatch");
            return Ok(None);
        }

        if user.expired {
            self.reset_expired_password(user.clone(), password, credentials)?;
        }

        Ok(Some(AuthenticatedUser::new(
            username.clone(),
            self.identifier.clone(),
            credentials.clone(),
        )))
    }

    async fn get_user_context(&self, user: &AuthenticatedUser) -> Result<Option<UserContext>> {
        if user.provider != self.identifier {
            // Federated login: only users with an enabled account here get a view
            match self.directory.stores().users.select_one(&user.identifier)? {
                Some(account) if !account.disabled => {}
                _ => return Ok(None),
            }
        }
        Ok(Some(self.context_for(&user.identifier)))
    }

    async fn update_user_context(
        &self,
        context: Arc<UserContext>,
        user: &AuthenticatedUser,
        _credentials: &Credentials,
    ) -> Result<Option<Arc<UserContext>>> {
        match self.directory.stores().users.select_one(&user.identifier)? {
            Some(account) if account.disabled => {
                info!(
                    provider = %self.identifier,
                    username = %user.identifier,
                    "Revoking context of disabled user"
                );
                Ok(None)
            }
            None if user.provider == self.identifier => {
                info!(
                    provider = %self.identifier,
                    username = %user.identifier,
                    "Revoking context of deleted user"
                );
                Ok(None)
            }
            _ => Ok(Some(context)),
        }
    }
}
