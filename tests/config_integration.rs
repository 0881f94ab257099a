//! Configuration files driving gateway behaviour

use std::sync::Arc;

use gatehouse_auth::{AuthenticationProvider, Credentials, DirectoryAuthenticationProvider};
use gatehouse_broker::{directory_from_config, Gateway, TunnelRequest};
use gatehouse_common::ErrorKind;
use gatehouse_config::{ConfigManager, ConfigStore};
use gatehouse_directory::{
    Argon2PasswordEncryption, Connection, DirectoryObject, DirectoryStores, User,
};
use gatehouse_permissions::{SystemPermission, SystemPermissionType};
use tempfile::TempDir;
use tokio::net::TcpListener;

#[tokio::test]
async fn test_configured_gateway_refuses_simultaneous_use() {
    let proxy = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = proxy.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = proxy.accept().await {
            held.push(stream);
        }
    });

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gatehouse.toml");
    std::fs::write(
        &path,
        format!(
            "[proxy]\nhostname = \"127.0.0.1\"\nport = {}\n\n\
             [tunnel]\ndisallow_simultaneous_connections = true\n\n\
             [history]\nmax_records = 5\n",
            port
        ),
    )
    .unwrap();

    let config = ConfigManager::with_path(&path)
        .with_env_prefix("GATEHOUSE_CONFIG_INTEGRATION")
        .load_config()
        .unwrap();
    assert!(config.tunnel.disallow_simultaneous_connections);
    assert_eq!(config.history.max_records, 5);

    let hasher = Arc::new(Argon2PasswordEncryption::with_params(1024, 1).unwrap());
    let directory = directory_from_config(&config, DirectoryStores::in_memory(), hasher.clone());
    let admin_rows = [SystemPermission::new(SystemPermissionType::Administer)]
        .into_iter()
        .collect();
    directory
        .stores()
        .permissions
        .insert_system_permissions("carol", &admin_rows)
        .unwrap();
    let carol = directory.subject("carol");
    directory
        .users
        .create(&carol, User::new("carol").with_password("pw"))
        .unwrap();
    let ssh = directory
        .connections
        .create(&carol, Connection::new("bastion", "ssh"))
        .unwrap();
    let request = TunnelRequest::new(format!("c/{}", ssh.identifier().unwrap()));

    let providers: Vec<Arc<dyn AuthenticationProvider>> = vec![Arc::new(
        DirectoryAuthenticationProvider::new("db", directory.clone(), hasher),
    )];
    let gateway = Gateway::with_tcp_proxy(config, providers, Vec::new());
    let token = gateway
        .login(&Credentials::new("carol", "pw"), None)
        .await
        .unwrap();

    assert!(gateway.connect(&token, &request).await.unwrap().is_connected());
    let err = gateway.connect(&token, &request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ConfigManager::with_path(dir.path().join("absent.toml"))
        .with_env_prefix("GATEHOUSE_CONFIG_INTEGRATION_DEFAULTS")
        .load_config()
        .unwrap();

    assert_eq!(config.proxy.address(), "localhost:4822");
    assert!(!config.tunnel.disallow_simultaneous_connections);
    assert_eq!(config.session.timeout_minutes, 60);
}
