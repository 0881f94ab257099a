//! Ad-hoc connections created from URIs
//!
//! The quick-connect provider never authenticates anyone itself. It gives
//! every authenticated user a private, in-memory directory to which they may
//! add connections described by a URI such as
//! `rdp://alice@desktop.example:3389/?security=nla`. These connections get
//! random identifiers and their use is not recorded in history.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_directory::{
    Connection, Directory, DirectoryObject, DirectoryStores, IdentifierStrategy,
    PasswordEncryption,
};
use gatehouse_permissions::{SystemPermission, SystemPermissionType};
use tracing::info;
use url::Url;

use crate::{
    context::UserContext,
    credentials::{AuthenticatedUser, Credentials},
    provider::AuthenticationProvider,
    GatewayError, Result,
};

/// Identifier of the quick-connect provider
pub const QUICKCONNECT_PROVIDER: &str = "quickconnect";

/// Parse a connection URI into an unsaved connection named after the URI
pub fn connection_from_uri(uri: &str) -> Result<Connection> {
    let uri = uri.trim();
    let parsed = Url::parse(uri)
        .map_err(|e| GatewayError::invalid(format!("Invalid connection URI: {}", e)))?;

    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| GatewayError::invalid("Connection URI must name a host"))?;

    let mut connection = Connection::new(uri, parsed.scheme()).with_parameter("hostname", host);
    if let Some(port) = parsed.port() {
        connection = connection.with_parameter("port", port.to_string());
    }
    if !parsed.username().is_empty() {
        connection = connection.with_parameter("username", parsed.username());
    }
    if let Some(password) = parsed.password() {
        connection = connection.with_parameter("password", password);
    }
    for (name, value) in parsed.query_pairs() {
        connection = connection.with_parameter(name.into_owned(), value.into_owned());
    }
    Ok(connection)
}

/// Provider of per-user quick-connect directories
pub struct QuickConnectProvider {
    hasher: Arc<dyn PasswordEncryption>,
}

impl QuickConnectProvider {
    pub fn new(hasher: Arc<dyn PasswordEncryption>) -> Self {
        Self { hasher }
    }

    /// Add the connection described by `uri` to a quick-connect context
    ///
    /// Returns the identifier of the new connection, or of the existing one
    /// when the same URI was added before.
    pub fn create_connection(context: &UserContext, uri: &str) -> Result<String> {
        if context.provider() != QUICKCONNECT_PROVIDER {
            return Err(GatewayError::invalid(
                "Quick connections can only be added to a quick-connect context",
            ));
        }

        let connection = connection_from_uri(uri)?;
        let connections = &context.directory().connections;
        let subject = context.subject();

        let readable = connections.identifiers(subject)?;
        if let Some(existing) = connections
            .retrieve_multiple(subject, &readable)?
            .into_iter()
            .find(|c| c.name == connection.name)
        {
            return existing
                .identifier()
                .map(str::to_string)
                .ok_or_else(|| GatewayError::internal("Stored connection without identifier"));
        }

        let created = connections.create(subject, connection)?;
        let identifier = created
            .identifier()
            .ok_or_else(|| GatewayError::internal("Stored connection without identifier"))?
            .to_string();
        info!(
            username = context.username(),
            identifier = %identifier,
            protocol = %created.protocol,
            "Quick connection added"
        );
        Ok(identifier)
    }
}

#[async_trait]
impl AuthenticationProvider for QuickConnectProvider {
    fn identifier(&self) -> &str {
        QUICKCONNECT_PROVIDER
    }

    async fn authenticate_user(
        &self,
        _credentials: &Credentials,
    ) -> Result<Option<AuthenticatedUser>> {
        Ok(None)
    }

    async fn get_user_context(&self, user: &AuthenticatedUser) -> Result<Option<UserContext>> {
        let stores = DirectoryStores::in_memory_with(IdentifierStrategy::Random, false);
        let grant: HashSet<_> = [SystemPermission::new(SystemPermissionType::CreateConnection)]
            .into_iter()
            .collect();
        stores
            .permissions
            .insert_system_permissions(&user.identifier, &grant)?;

        let directory = Arc::new(Directory::new(stores, self.hasher.clone(), 0));
        let subject = Arc::new(directory.subject(&user.identifier));
        Ok(Some(UserContext::new(
            QUICKCONNECT_PROVIDER,
            user.identifier.clone(),
            subject,
            directory,
        )))
    }
}
