//! Permission subjects

use std::sync::Arc;

use crate::{
    models::{ObjectClass, SystemPermissionType},
    set::{
        ObjectPermissionSet, SimpleObjectPermissionSet, SimpleSystemPermissionSet,
        SystemPermissionSet,
    },
    storage::{PermissionStore, StoredObjectPermissionSet, StoredSystemPermissionSet},
    Result,
};

/// A principal whose rights are described by permission sets
pub trait Subject: Send + Sync {
    /// Identifier of the subject, normally a username
    fn identifier(&self) -> &str;

    /// System-wide permissions of the subject
    fn system_permissions(&self) -> Arc<dyn SystemPermissionSet>;

    /// Permissions of the subject over `class`
    fn object_permissions(&self, class: ObjectClass) -> Arc<dyn ObjectPermissionSet>;

    /// Whether the subject holds system ADMINISTER
    fn is_administrator(&self) -> Result<bool> {
        self.system_permissions()
            .has_permission(SystemPermissionType::Administer)
    }
}

/// Subject whose permissions are read from a [`PermissionStore`] on every call
#[derive(Clone)]
pub struct StoredSubject {
    identifier: String,
    store: Arc<dyn PermissionStore>,
}

impl StoredSubject {
    pub fn new(identifier: impl Into<String>, store: Arc<dyn PermissionStore>) -> Self {
        Self {
            identifier: identifier.into(),
            store,
        }
    }
}

impl Subject for StoredSubject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn system_permissions(&self) -> Arc<dyn SystemPermissionSet> {
        Arc::new(StoredSystemPermissionSet::read_only(
            self.store.clone(),
            self.identifier.clone(),
        ))
    }

    fn object_permissions(&self, class: ObjectClass) -> Arc<dyn ObjectPermissionSet> {
        Arc::new(StoredObjectPermissionSet::read_only(
            self.store.clone(),
            self.identifier.clone(),
            class,
        ))
    }
}

/// Subject with a fixed set of permissions, as used by directories that are
/// built per session and never persisted
#[derive(Clone)]
pub struct FixedSubject {
    identifier: String,
    system: Arc<SimpleSystemPermissionSet>,
    users: Arc<SimpleObjectPermissionSet>,
    connections: Arc<SimpleObjectPermissionSet>,
    groups: Arc<SimpleObjectPermissionSet>,
}

impl FixedSubject {
    pub fn new(
        identifier: impl Into<String>,
        system: SimpleSystemPermissionSet,
        users: SimpleObjectPermissionSet,
        connections: SimpleObjectPermissionSet,
        groups: SimpleObjectPermissionSet,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            system: Arc::new(system),
            users: Arc::new(users),
            connections: Arc::new(connections),
            groups: Arc::new(groups),
        }
    }
}

impl Subject for FixedSubject {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn system_permissions(&self) -> Arc<dyn SystemPermissionSet> {
        self.system.clone()
    }

    fn object_permissions(&self, class: ObjectClass) -> Arc<dyn ObjectPermissionSet> {
        match class {
            ObjectClass::User => self.users.clone(),
            ObjectClass::Connection => self.connections.clone(),
            ObjectClass::ConnectionGroup => self.groups.clone(),
        }
    }
}
