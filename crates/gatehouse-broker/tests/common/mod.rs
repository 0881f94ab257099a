//! Shared fixtures for broker tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_auth::{AuthenticationChain, Credentials, DirectoryAuthenticationProvider};
use gatehouse_broker::{ClientInfo, ProxySocket, ProxySocketFactory, TunnelBroker};
use gatehouse_common::{GatewayError, Result};
use gatehouse_directory::{
    Argon2PasswordEncryption, Connection, ConnectionGroup, ConnectionRecord, Directory,
    DirectoryObject, DirectoryStores, GroupType, User,
};
use gatehouse_permissions::{
    ObjectClass, ObjectPermission, ObjectPermissionType, SystemPermission, SystemPermissionType,
};
use gatehouse_sessions::{
    AuthenticationService, EventBus, Listener, ListenerEvent, ListenerNotifier, Session,
    SessionStore,
};

pub const PROVIDER: &str = "db";

/// Socket that only counts close calls
pub struct FakeSocket {
    open: AtomicBool,
    close_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ProxySocket for FakeSocket {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        // Give concurrent closers a chance to interleave
        tokio::task::yield_now().await;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSockets {
    pub opened: AtomicUsize,
    pub close_calls: Arc<AtomicUsize>,
    pub unavailable: AtomicBool,
}

impl FakeSockets {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxySocketFactory for FakeSockets {
    async fn open(
        &self,
        _connection: &Connection,
        _client: &ClientInfo,
    ) -> Result<Box<dyn ProxySocket>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::unavailable("proxy down"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSocket {
            open: AtomicBool::new(true),
            close_calls: self.close_calls.clone(),
        }))
    }
}

/// Listener refusing connects and/or vetoable closes
pub struct Refusing {
    pub connect: bool,
    pub close: bool,
}

impl Listener for Refusing {
    fn name(&self) -> &str {
        "refusing"
    }

    fn handle(&self, event: &ListenerEvent) -> Result<bool> {
        Ok(match event {
            ListenerEvent::TunnelConnect(_) => !self.connect,
            ListenerEvent::TunnelClose { .. } => !self.close,
            _ => true,
        })
    }
}

/// Identifiers of the objects created by [`fixture`]
pub struct Objects {
    /// Readable by alice
    pub db: String,
    /// Readable by bob
    pub web: String,
    /// Balancing group readable by alice, with children `pool_a` and `pool_b`
    pub pool: String,
    pub pool_a: String,
    pub pool_b: String,
    /// Organizational group readable by alice
    pub dept: String,
}

pub struct Fixture {
    pub directory: Arc<Directory>,
    pub objects: Objects,
    pub sockets: Arc<FakeSockets>,
    pub bus: EventBus,
    pub auth: AuthenticationService,
    pub broker: TunnelBroker,
}

impl Fixture {
    pub async fn login(&self, username: &str) -> Arc<Session> {
        let token = self
            .auth
            .authenticate(&Credentials::new(username, username), None)
            .await
            .unwrap();
        self.auth.session(&token).unwrap()
    }

    pub fn history(&self) -> Vec<ConnectionRecord> {
        self.directory
            .stores()
            .history
            .as_ref()
            .unwrap()
            .select_all()
            .unwrap()
    }
}

pub fn grant_read(directory: &Directory, subject: &str, class: ObjectClass, identifier: &str) {
    let rows: HashSet<_> = [ObjectPermission::new(ObjectPermissionType::Read, identifier)]
        .into_iter()
        .collect();
    directory
        .stores()
        .permissions
        .insert_object_permissions(subject, class, &rows)
        .unwrap();
}

pub fn id(object: &impl DirectoryObject) -> String {
    object.identifier().unwrap().to_string()
}

pub fn fixture(listeners: Vec<Arc<dyn Listener>>, exclusive: bool) -> Fixture {
    let hasher = Arc::new(Argon2PasswordEncryption::with_params(1024, 1).unwrap());
    let directory = Arc::new(Directory::new(DirectoryStores::in_memory(), hasher.clone(), 100));

    let admin_rows: HashSet<_> = [SystemPermission::new(SystemPermissionType::Administer)]
        .into_iter()
        .collect();
    directory
        .stores()
        .permissions
        .insert_system_permissions("admin", &admin_rows)
        .unwrap();
    let admin = directory.subject("admin");

    for name in ["admin", "alice", "bob"] {
        directory
            .users
            .create(&admin, User::new(name).with_password(name))
            .unwrap();
    }

    let db = directory
        .connections
        .create(&admin, Connection::new("db", "rdp"))
        .unwrap();
    let web = directory
        .connections
        .create(&admin, Connection::new("web", "vnc"))
        .unwrap();
    let pool = directory
        .groups
        .create(&admin, ConnectionGroup::new("pool", GroupType::Balancing))
        .unwrap();
    let dept = directory
        .groups
        .create(&admin, ConnectionGroup::new("dept", GroupType::Organizational))
        .unwrap();
    let pool_a = directory
        .connections
        .create(&admin, Connection::new("pool-a", "ssh").within(id(&pool)))
        .unwrap();
    let pool_b = directory
        .connections
        .create(&admin, Connection::new("pool-b", "ssh").within(id(&pool)))
        .unwrap();

    let objects = Objects {
        db: id(&db),
        web: id(&web),
        pool: id(&pool),
        pool_a: id(&pool_a),
        pool_b: id(&pool_b),
        dept: id(&dept),
    };

    for connection in [&objects.db, &objects.pool_a, &objects.pool_b] {
        grant_read(&directory, "alice", ObjectClass::Connection, connection);
    }
    grant_read(&directory, "alice", ObjectClass::ConnectionGroup, &objects.pool);
    grant_read(&directory, "alice", ObjectClass::ConnectionGroup, &objects.dept);
    grant_read(&directory, "bob", ObjectClass::Connection, &objects.web);

    let bus = EventBus::new();
    let chain = AuthenticationChain::new(vec![Arc::new(DirectoryAuthenticationProvider::new(
        PROVIDER,
        directory.clone(),
        hasher,
    ))]);
    let auth = AuthenticationService::new(
        chain,
        Arc::new(SessionStore::new(std::time::Duration::from_secs(3600), bus.clone())),
        Arc::new(ListenerNotifier::new(listeners)),
    );

    let sockets = Arc::new(FakeSockets::default());
    let broker = TunnelBroker::new(sockets.clone(), bus.clone())
        .with_simultaneous_connections_disallowed(exclusive);

    Fixture {
        directory,
        objects,
        sockets,
        bus,
        auth,
        broker,
    }
}
