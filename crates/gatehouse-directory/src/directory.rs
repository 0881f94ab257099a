//! A complete directory bound to one set of stores

use std::sync::Arc;

use gatehouse_permissions::{
    InMemoryPermissionStore, ObjectClass, ObjectPermissionService, PermissionStore,
    StoredSubject, SystemPermissionService,
};

use crate::{
    history::{HistoryStore, InMemoryHistoryStore},
    kind::{ConnectionGroupKind, ConnectionKind, UserKind},
    model::{Connection, ConnectionGroup, User},
    password::PasswordEncryption,
    service::DirectoryObjectService,
    storage::{IdentifierStrategy, InMemoryObjectStore, ObjectStore},
    tree::ConnectionTree,
};

/// Stores backing a directory
#[derive(Clone)]
pub struct DirectoryStores {
    pub users: Arc<dyn ObjectStore<User>>,
    pub connections: Arc<dyn ObjectStore<Connection>>,
    pub groups: Arc<dyn ObjectStore<ConnectionGroup>>,
    pub permissions: Arc<dyn PermissionStore>,
    /// `None` when uses of connections are not recorded
    pub history: Option<Arc<dyn HistoryStore>>,
}

impl DirectoryStores {
    /// In-memory stores with numeric connection and group identifiers
    pub fn in_memory() -> Self {
        Self::in_memory_with(IdentifierStrategy::Sequential, true)
    }

    pub fn in_memory_with(strategy: IdentifierStrategy, historized: bool) -> Self {
        let history: Option<Arc<dyn HistoryStore>> = if historized {
            Some(Arc::new(InMemoryHistoryStore::new()))
        } else {
            None
        };
        Self {
            users: Arc::new(InMemoryObjectStore::new(IdentifierStrategy::Natural, "User")),
            connections: Arc::new(InMemoryObjectStore::new(strategy, "Connection")),
            groups: Arc::new(InMemoryObjectStore::new(strategy, "Connection group")),
            permissions: Arc::new(InMemoryPermissionStore::new()),
            history,
        }
    }
}

/// Users, connections, groups and permissions of one provider
pub struct Directory {
    pub users: Arc<DirectoryObjectService<UserKind>>,
    pub connections: Arc<DirectoryObjectService<ConnectionKind>>,
    pub groups: Arc<DirectoryObjectService<ConnectionGroupKind>>,
    pub tree: ConnectionTree,
    pub user_permissions: ObjectPermissionService,
    pub connection_permissions: ObjectPermissionService,
    pub group_permissions: ObjectPermissionService,
    pub system_permissions: SystemPermissionService,
    stores: DirectoryStores,
}

impl Directory {
    pub fn new(
        stores: DirectoryStores,
        hasher: Arc<dyn PasswordEncryption>,
        history_limit: usize,
    ) -> Self {
        let users = Arc::new(DirectoryObjectService::new(
            UserKind::new(hasher),
            stores.users.clone(),
            stores.permissions.clone(),
        ));
        let connections = Arc::new(DirectoryObjectService::new(
            ConnectionKind::new(stores.groups.clone()),
            stores.connections.clone(),
            stores.permissions.clone(),
        ));
        let groups = Arc::new(DirectoryObjectService::new(
            ConnectionGroupKind::new(stores.groups.clone(), stores.connections.clone()),
            stores.groups.clone(),
            stores.permissions.clone(),
        ));
        let tree = ConnectionTree::new(
            connections.clone(),
            groups.clone(),
            stores.history.clone(),
            history_limit,
        );

        Self {
            users,
            connections,
            groups,
            tree,
            user_permissions: ObjectPermissionService::new(
                stores.permissions.clone(),
                ObjectClass::User,
            ),
            connection_permissions: ObjectPermissionService::new(
                stores.permissions.clone(),
                ObjectClass::Connection,
            ),
            group_permissions: ObjectPermissionService::new(
                stores.permissions.clone(),
                ObjectClass::ConnectionGroup,
            ),
            system_permissions: SystemPermissionService::new(stores.permissions.clone()),
            stores,
        }
    }

    /// Permission subject for `username` within this directory
    pub fn subject(&self, username: &str) -> StoredSubject {
        StoredSubject::new(username, self.stores.permissions.clone())
    }

    pub fn stores(&self) -> &DirectoryStores {
        &self.stores
    }

    pub fn historizes(&self) -> bool {
        self.stores.history.is_some()
    }
}
