//! Wiring of the gateway components from configuration

use std::sync::Arc;

use gatehouse_auth::{AuthenticationChain, AuthenticationProvider, Credentials};
use gatehouse_common::Result;
use gatehouse_config::GatewayConfig;
use gatehouse_directory::{Directory, DirectoryStores, PasswordEncryption};
use gatehouse_sessions::{
    AuthenticationService, CloseOutcome, EventBus, Listener, ListenerNotifier, SessionStore,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::active::ActiveConnection;
use crate::broker::{ConnectOutcome, TunnelBroker};
use crate::request::TunnelRequest;
use crate::socket::{ProxySocketFactory, TcpProxySocketFactory};

/// Directory whose history queries honour the configured record limit
pub fn directory_from_config(
    config: &GatewayConfig,
    stores: DirectoryStores,
    hasher: Arc<dyn PasswordEncryption>,
) -> Arc<Directory> {
    Arc::new(Directory::new(stores, hasher, config.history.max_records))
}

/// The assembled gateway: authentication, sessions and tunnels
pub struct Gateway {
    config: GatewayConfig,
    bus: EventBus,
    auth: AuthenticationService,
    broker: TunnelBroker,
    shutdown: CancellationToken,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        providers: Vec<Arc<dyn AuthenticationProvider>>,
        listeners: Vec<Arc<dyn Listener>>,
        sockets: Arc<dyn ProxySocketFactory>,
    ) -> Self {
        let bus = EventBus::new();
        let store = Arc::new(SessionStore::new(config.session.idle_timeout(), bus.clone()));
        let auth = AuthenticationService::new(
            AuthenticationChain::new(providers),
            store,
            Arc::new(ListenerNotifier::new(listeners)),
        );
        let exclusive = config.tunnel.disallow_simultaneous_connections;
        let broker = TunnelBroker::new(sockets, bus.clone())
            .with_simultaneous_connections_disallowed(exclusive);

        Self {
            config,
            bus,
            auth,
            broker,
            shutdown: CancellationToken::new(),
        }
    }

    /// Gateway connecting to the proxy daemon over TCP as configured
    pub fn with_tcp_proxy(
        config: GatewayConfig,
        providers: Vec<Arc<dyn AuthenticationProvider>>,
        listeners: Vec<Arc<dyn Listener>>,
    ) -> Self {
        let sockets = Arc::new(TcpProxySocketFactory::from_config(&config.proxy));
        Self::new(config, providers, listeners, sockets)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn auth(&self) -> &AuthenticationService {
        &self.auth
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.auth.store()
    }

    pub fn broker(&self) -> &TunnelBroker {
        &self.broker
    }

    /// Start the idle-session sweeper
    pub fn start(&self) -> JoinHandle<()> {
        info!(
            idle_timeout_secs = self.config.session.idle_timeout().as_secs(),
            sweep_interval_secs = self.config.session.sweep_interval().as_secs(),
            "Starting session sweeper"
        );
        self.sessions()
            .spawn_sweeper(self.config.session.sweep_interval(), self.shutdown.child_token())
    }

    /// Stop the sweeper and destroy every session, closing all tunnels
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let sessions = self.sessions().sessions();
        info!(sessions = sessions.len(), "Shutting down gateway");
        for session in sessions {
            self.sessions().destroy(session.token()).await;
        }
    }

    pub async fn login(&self, credentials: &Credentials, token: Option<&str>) -> Result<String> {
        self.auth.authenticate(credentials, token).await
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.auth.logout(token).await
    }

    pub async fn connect(&self, token: &str, request: &TunnelRequest) -> Result<ConnectOutcome> {
        let session = self.auth.session(token)?;
        self.broker.connect(&session, request).await
    }

    pub async fn disconnect(&self, token: &str, tunnel_id: &Uuid) -> Result<CloseOutcome> {
        let session = self.auth.session(token)?;
        self.broker.close(&session, tunnel_id).await
    }

    pub fn active_connections(&self, token: &str) -> Result<Vec<ActiveConnection>> {
        let session = self.auth.session(token)?;
        self.broker.active_connections(&session)
    }
}
