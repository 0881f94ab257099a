//! Tests for the authentication chain and the bundled providers

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_auth::{
    AuthenticatedUser, AuthenticationChain, AuthenticationProvider, Credentials,
    DirectoryAuthenticationProvider, GatewayError, QuickConnectProvider, UserContext,
    CONFIRM_NEW_PASSWORD_PARAMETER, NEW_PASSWORD_PARAMETER, PASSWORD_BLANK, PASSWORD_MISMATCH,
    PASSWORD_SAME, QUICKCONNECT_PROVIDER,
};
use gatehouse_common::{ErrorKind, FieldType};
use gatehouse_directory::{
    Argon2PasswordEncryption, Directory, DirectoryStores, PasswordEncryption, User,
};
use gatehouse_permissions::{SystemPermission, SystemPermissionType};

fn hasher() -> Arc<dyn PasswordEncryption> {
    Arc::new(Argon2PasswordEncryption::with_params(1024, 1).unwrap())
}

/// Directory containing `users`, created by a bootstrap administrator
fn directory_with(users: Vec<User>) -> Arc<Directory> {
    let directory = Directory::new(DirectoryStores::in_memory(), hasher(), 100);
    let admin: HashSet<_> = [SystemPermission::new(SystemPermissionType::Administer)]
        .into_iter()
        .collect();
    directory
        .stores()
        .permissions
        .insert_system_permissions("bootstrap", &admin)
        .unwrap();
    let bootstrap = directory.subject("bootstrap");
    for user in users {
        directory.users.create(&bootstrap, user).unwrap();
    }
    Arc::new(directory)
}

fn provider(name: &str, directory: Arc<Directory>) -> Arc<dyn AuthenticationProvider> {
    Arc::new(DirectoryAuthenticationProvider::new(name, directory, hasher()))
}

/// Provider that always fails with a fixed error
struct FailingProvider(GatewayError);

#[async_trait]
impl AuthenticationProvider for FailingProvider {
    fn identifier(&self) -> &str {
        "failing"
    }

    async fn authenticate_user(
        &self,
        _: &Credentials,
    ) -> gatehouse_auth::Result<Option<AuthenticatedUser>> {
        Err(self.0.clone())
    }

    async fn get_user_context(
        &self,
        _: &AuthenticatedUser,
    ) -> gatehouse_auth::Result<Option<UserContext>> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_valid_login() {
    let directory = directory_with(vec![User::new("alice").with_password("secret")]);
    let chain = AuthenticationChain::new(vec![provider("db", directory)]);

    let result = chain
        .authenticate(&Credentials::new("alice", "secret"))
        .await
        .unwrap();
    assert_eq!(result.user.identifier, "alice");
    assert_eq!(result.user.provider, "db");
    assert_eq!(result.contexts.len(), 1);
    assert_eq!(result.contexts[0].username(), "alice");
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_are_denied() {
    let directory = directory_with(vec![User::new("alice").with_password("secret")]);
    let chain = AuthenticationChain::new(vec![provider("db", directory)]);

    let err = chain
        .authenticate(&Credentials::new("alice", "guess"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = chain
        .authenticate(&Credentials::new("mallory", "secret"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = chain.authenticate(&Credentials::anonymous()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_disabled_user_cannot_log_in() {
    let directory = directory_with(vec![User::new("alice").with_password("secret").disabled(true)]);
    let chain = AuthenticationChain::new(vec![provider("db", directory)]);

    let err = chain
        .authenticate(&Credentials::new("alice", "secret"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_first_provider_wins_and_others_federate() {
    let first = directory_with(vec![User::new("alice").with_password("one")]);
    let second = directory_with(vec![User::new("alice").with_password("two")]);
    let chain = AuthenticationChain::new(vec![
        provider("first", first),
        provider("second", second),
    ]);

    let result = chain
        .authenticate(&Credentials::new("alice", "two"))
        .await
        .unwrap();
    assert_eq!(result.user.provider, "second");

    let providers: Vec<_> = result.contexts.iter().map(|c| c.provider()).collect();
    assert_eq!(providers, vec!["first", "second"]);
}

#[tokio::test]
async fn test_credential_error_remembered_until_someone_succeeds() {
    let directory = directory_with(vec![User::new("alice").with_password("secret")]);
    let rejecting: Arc<dyn AuthenticationProvider> =
        Arc::new(FailingProvider(GatewayError::invalid("bad token")));

    let chain = AuthenticationChain::new(vec![rejecting.clone(), provider("db", directory)]);
    assert!(chain
        .authenticate(&Credentials::new("alice", "secret"))
        .await
        .is_ok());

    let err = chain
        .authenticate(&Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::invalid("bad token"));
}

#[tokio::test]
async fn test_unavailable_aborts_chain() {
    let directory = directory_with(vec![User::new("alice").with_password("secret")]);
    let chain = AuthenticationChain::new(vec![
        Arc::new(FailingProvider(GatewayError::unavailable("ldap down"))),
        provider("db", directory),
    ]);

    let err = chain
        .authenticate(&Credentials::new("alice", "secret"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}

#[tokio::test]
async fn test_expired_password_requires_exactly_two_fields() {
    let directory = directory_with(vec![User::new("alice").with_password("old").expired(true)]);
    let chain = AuthenticationChain::new(vec![provider("db", directory)]);

    let err = chain
        .authenticate(&Credentials::new("alice", "old"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientCredentials);

    let fields = err.required_fields();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, NEW_PASSWORD_PARAMETER);
    assert_eq!(fields[1].name, CONFIRM_NEW_PASSWORD_PARAMETER);
    assert!(fields.iter().all(|f| f.field_type == FieldType::Password));

    // Only one of the two fields is still insufficient
    let err = chain
        .authenticate(
            &Credentials::new("alice", "old").with_parameter(NEW_PASSWORD_PARAMETER, "new"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientCredentials);
}

fn reset(new: &str, confirm: &str) -> Credentials {
    Credentials::new("alice", "old")
        .with_parameter(NEW_PASSWORD_PARAMETER, new)
        .with_parameter(CONFIRM_NEW_PASSWORD_PARAMETER, confirm)
}

#[tokio::test]
async fn test_expired_password_validation_failures_are_distinct() {
    let directory = directory_with(vec![User::new("alice").with_password("old").expired(true)]);
    let chain = AuthenticationChain::new(vec![provider("db", directory)]);

    let err = chain.authenticate(&reset("old", "old")).await.unwrap_err();
    assert_eq!(err, GatewayError::invalid(PASSWORD_SAME));

    let err = chain.authenticate(&reset("", "")).await.unwrap_err();
    assert_eq!(err, GatewayError::invalid(PASSWORD_BLANK));

    let err = chain.authenticate(&reset("new", "other")).await.unwrap_err();
    assert_eq!(err, GatewayError::invalid(PASSWORD_MISMATCH));
}

#[tokio::test]
async fn test_expired_password_reset_flow() {
    let directory = directory_with(vec![User::new("alice").with_password("old").expired(true)]);
    let chain = AuthenticationChain::new(vec![provider("db", directory.clone())]);

    chain.authenticate(&reset("new", "new")).await.unwrap();

    let stored = directory.stores().users.select_one("alice").unwrap().unwrap();
    assert!(!stored.expired);
    assert!(!stored.attributes.contains_key(gatehouse_directory::EXPIRED_ATTRIBUTE));

    assert!(chain
        .authenticate(&Credentials::new("alice", "new"))
        .await
        .is_ok());
    let err = chain
        .authenticate(&Credentials::new("alice", "old"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_update_keeps_context_identity() {
    let directory = directory_with(vec![User::new("alice").with_password("secret")]);
    let chain = AuthenticationChain::new(vec![provider("db", directory)]);
    let credentials = Credentials::new("alice", "secret");
    let result = chain.authenticate(&credentials).await.unwrap();

    let updated = chain
        .update_user_contexts(&result.user, &result.contexts, &credentials)
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert!(Arc::ptr_eq(&updated[0], &result.contexts[0]));
}

#[tokio::test]
async fn test_update_revokes_disabled_user() {
    let directory = directory_with(vec![User::new("alice").with_password("secret")]);
    let chain = AuthenticationChain::new(vec![provider("db", directory.clone())]);
    let credentials = Credentials::new("alice", "secret");
    let result = chain.authenticate(&credentials).await.unwrap();

    let mut alice = directory.stores().users.select_one("alice").unwrap().unwrap();
    alice.disabled = true;
    directory.stores().users.update(&alice).unwrap();

    let updated = chain
        .update_user_contexts(&result.user, &result.contexts, &credentials)
        .await
        .unwrap();
    assert!(updated.is_empty());
}

#[tokio::test]
async fn test_quickconnect_context() {
    let directory = directory_with(vec![User::new("alice").with_password("secret")]);
    let chain = AuthenticationChain::new(vec![
        provider("db", directory),
        Arc::new(QuickConnectProvider::new(hasher())),
    ]);
    let result = chain
        .authenticate(&Credentials::new("alice", "secret"))
        .await
        .unwrap();
    let quick = result
        .contexts
        .iter()
        .find(|c| c.provider() == QUICKCONNECT_PROVIDER)
        .unwrap();
    assert!(!quick.directory().historizes());

    let id = QuickConnectProvider::create_connection(quick, "ssh://alice@jump.example:22").unwrap();
    let again =
        QuickConnectProvider::create_connection(quick, "ssh://alice@jump.example:22").unwrap();
    assert_eq!(id, again);

    let connection = quick.directory().tree.connection(quick.subject(), &id).unwrap();
    assert_eq!(connection.protocol, "ssh");

    let db = result.contexts.iter().find(|c| c.provider() == "db").unwrap();
    let err = QuickConnectProvider::create_connection(db, "ssh://x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
}
