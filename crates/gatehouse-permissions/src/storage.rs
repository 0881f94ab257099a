//! Permission persistence
//!
//! [`PermissionStore`] is the persistence boundary for permission rows.
//! Writes are serialised here, not in the services. Rows are unique on
//! (subject, class, type, identifier), so repeated grants are idempotent.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::{
    models::{
        ObjectClass, ObjectPermission, ObjectPermissionType, SystemPermission,
        SystemPermissionType,
    },
    set::{ObjectPermissionSet, SystemPermissionSet},
    GatewayError, Result,
};

/// Repository trait for permission rows
pub trait PermissionStore: Send + Sync {
    /// All object permissions of `subject` over `class`
    fn select_object_permissions(
        &self,
        subject: &str,
        class: ObjectClass,
    ) -> Result<HashSet<ObjectPermission>>;

    /// Whether a single object permission row exists
    fn has_object_permission(
        &self,
        subject: &str,
        class: ObjectClass,
        permission: &ObjectPermission,
    ) -> Result<bool>;

    /// Bulk select: members of `identifiers` holding any of `types`
    fn select_accessible_identifiers(
        &self,
        subject: &str,
        class: ObjectClass,
        types: &[ObjectPermissionType],
        identifiers: &HashSet<String>,
    ) -> Result<HashSet<String>>;

    fn insert_object_permissions(
        &self,
        subject: &str,
        class: ObjectClass,
        permissions: &HashSet<ObjectPermission>,
    ) -> Result<()>;

    fn delete_object_permissions(
        &self,
        subject: &str,
        class: ObjectClass,
        permissions: &HashSet<ObjectPermission>,
    ) -> Result<()>;

    /// Drop every row referencing a deleted object
    fn delete_object(&self, class: ObjectClass, identifier: &str) -> Result<()>;

    fn select_system_permissions(&self, subject: &str) -> Result<HashSet<SystemPermission>>;

    fn insert_system_permissions(
        &self,
        subject: &str,
        permissions: &HashSet<SystemPermission>,
    ) -> Result<()>;

    fn delete_system_permissions(
        &self,
        subject: &str,
        permissions: &HashSet<SystemPermission>,
    ) -> Result<()>;

    /// Drop every row held by a deleted subject
    fn delete_subject(&self, subject: &str) -> Result<()>;
}

type ObjectRows = HashMap<(String, ObjectClass), HashSet<ObjectPermission>>;

/// In-memory permission store
#[derive(Default)]
pub struct InMemoryPermissionStore {
    object_rows: RwLock<ObjectRows>,
    system_rows: RwLock<HashMap<String, HashSet<SystemPermission>>>,
}

impl InMemoryPermissionStore {
    /// Create a new in-memory permission store
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> GatewayError {
    GatewayError::internal(format!("Permission store lock poisoned: {}", e))
}

impl PermissionStore for InMemoryPermissionStore {
    fn select_object_permissions(
        &self,
        subject: &str,
        class: ObjectClass,
    ) -> Result<HashSet<ObjectPermission>> {
        let rows = self.object_rows.read().map_err(poisoned)?;
        Ok(rows
            .get(&(subject.to_string(), class))
            .cloned()
            .unwrap_or_default())
    }

    fn has_object_permission(
        &self,
        subject: &str,
        class: ObjectClass,
        permission: &ObjectPermission,
    ) -> Result<bool> {
        let rows = self.object_rows.read().map_err(poisoned)?;
        Ok(rows
            .get(&(subject.to_string(), class))
            .is_some_and(|set| set.contains(permission)))
    }

    fn select_accessible_identifiers(
        &self,
        subject: &str,
        class: ObjectClass,
        types: &[ObjectPermissionType],
        identifiers: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        let rows = self.object_rows.read().map_err(poisoned)?;
        let Some(set) = rows.get(&(subject.to_string(), class)) else {
            return Ok(HashSet::new());
        };

        Ok(set
            .iter()
            .filter(|p| types.contains(&p.permission_type) && identifiers.contains(&p.identifier))
            .map(|p| p.identifier.clone())
            .collect())
    }

    fn insert_object_permissions(
        &self,
        subject: &str,
        class: ObjectClass,
        permissions: &HashSet<ObjectPermission>,
    ) -> Result<()> {
        let mut rows = self.object_rows.write().map_err(poisoned)?;
        rows.entry((subject.to_string(), class))
            .or_default()
            .extend(permissions.iter().cloned());
        Ok(())
    }

    fn delete_object_permissions(
        &self,
        subject: &str,
        class: ObjectClass,
        permissions: &HashSet<ObjectPermission>,
    ) -> Result<()> {
        let mut rows = self.object_rows.write().map_err(poisoned)?;
        if let Some(set) = rows.get_mut(&(subject.to_string(), class)) {
            set.retain(|p| !permissions.contains(p));
        }
        Ok(())
    }

    fn delete_object(&self, class: ObjectClass, identifier: &str) -> Result<()> {
        let mut rows = self.object_rows.write().map_err(poisoned)?;
        for ((_, row_class), set) in rows.iter_mut() {
            if *row_class == class {
                set.retain(|p| p.identifier != identifier);
            }
        }
        Ok(())
    }

    fn select_system_permissions(&self, subject: &str) -> Result<HashSet<SystemPermission>> {
        let rows = self.system_rows.read().map_err(poisoned)?;
        Ok(rows.get(subject).cloned().unwrap_or_default())
    }

    fn insert_system_permissions(
        &self,
        subject: &str,
        permissions: &HashSet<SystemPermission>,
    ) -> Result<()> {
        let mut rows = self.system_rows.write().map_err(poisoned)?;
        rows.entry(subject.to_string())
            .or_default()
            .extend(permissions.iter().copied());
        Ok(())
    }

    fn delete_system_permissions(
        &self,
        subject: &str,
        permissions: &HashSet<SystemPermission>,
    ) -> Result<()> {
        let mut rows = self.system_rows.write().map_err(poisoned)?;
        if let Some(set) = rows.get_mut(subject) {
            set.retain(|p| !permissions.contains(p));
        }
        Ok(())
    }

    fn delete_subject(&self, subject: &str) -> Result<()> {
        self.object_rows
            .write()
            .map_err(poisoned)?
            .retain(|(row_subject, _), _| row_subject != subject);
        self.system_rows.write().map_err(poisoned)?.remove(subject);
        Ok(())
    }
}

/// Object permission set reading through to a [`PermissionStore`]
///
/// A set built with [`StoredObjectPermissionSet::read_only`] rejects
/// mutation; grants on behalf of a caller go through
/// [`ObjectPermissionService`](crate::service::ObjectPermissionService).
#[derive(Clone)]
pub struct StoredObjectPermissionSet {
    store: Arc<dyn PermissionStore>,
    subject: String,
    class: ObjectClass,
    writable: bool,
}

impl StoredObjectPermissionSet {
    /// Writable view used for internal bootstrapping
    pub fn new(
        store: Arc<dyn PermissionStore>,
        subject: impl Into<String>,
        class: ObjectClass,
    ) -> Self {
        Self {
            store,
            subject: subject.into(),
            class,
            writable: true,
        }
    }

    pub fn read_only(
        store: Arc<dyn PermissionStore>,
        subject: impl Into<String>,
        class: ObjectClass,
    ) -> Self {
        Self {
            writable: false,
            ..Self::new(store, subject, class)
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(GatewayError::permission_denied(format!(
                "Permissions of {} are read-only here",
                self.subject
            )))
        }
    }
}

impl ObjectPermissionSet for StoredObjectPermissionSet {
    fn has_permission(&self, permission: ObjectPermissionType, identifier: &str) -> Result<bool> {
        self.store.has_object_permission(
            &self.subject,
            self.class,
            &ObjectPermission::new(permission, identifier),
        )
    }

    fn accessible_objects(
        &self,
        types: &[ObjectPermissionType],
        identifiers: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        if identifiers.is_empty() {
            return Ok(HashSet::new());
        }
        self.store
            .select_accessible_identifiers(&self.subject, self.class, types, identifiers)
    }

    fn permissions(&self) -> Result<HashSet<ObjectPermission>> {
        self.store.select_object_permissions(&self.subject, self.class)
    }

    fn add_permissions(&self, permissions: &HashSet<ObjectPermission>) -> Result<()> {
        self.check_writable()?;
        self.store
            .insert_object_permissions(&self.subject, self.class, permissions)
    }

    fn remove_permissions(&self, permissions: &HashSet<ObjectPermission>) -> Result<()> {
        self.check_writable()?;
        self.store
            .delete_object_permissions(&self.subject, self.class, permissions)
    }
}

/// System permission set reading through to a [`PermissionStore`]
#[derive(Clone)]
pub struct StoredSystemPermissionSet {
    store: Arc<dyn PermissionStore>,
    subject: String,
    writable: bool,
}

impl StoredSystemPermissionSet {
    pub fn new(store: Arc<dyn PermissionStore>, subject: impl Into<String>) -> Self {
        Self {
            store,
            subject: subject.into(),
            writable: true,
        }
    }

    pub fn read_only(store: Arc<dyn PermissionStore>, subject: impl Into<String>) -> Self {
        Self {
            writable: false,
            ..Self::new(store, subject)
        }
    }
}

impl SystemPermissionSet for StoredSystemPermissionSet {
    fn has_permission(&self, permission: SystemPermissionType) -> Result<bool> {
        Ok(self
            .store
            .select_system_permissions(&self.subject)?
            .contains(&SystemPermission::new(permission)))
    }

    fn permissions(&self) -> Result<HashSet<SystemPermission>> {
        self.store.select_system_permissions(&self.subject)
    }

    fn add_permissions(&self, permissions: &HashSet<SystemPermission>) -> Result<()> {
        if !self.writable {
            return Err(GatewayError::permission_denied("System permissions are read-only here"));
        }
        self.store.insert_system_permissions(&self.subject, permissions)
    }

    fn remove_permissions(&self, permissions: &HashSet<SystemPermission>) -> Result<()> {
        if !self.writable {
            return Err(GatewayError::permission_denied("System permissions are read-only here"));
        }
        self.store.delete_system_permissions(&self.subject, permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(types: &[ObjectPermissionType], id: &str) -> HashSet<ObjectPermission> {
        types.iter().map(|t| ObjectPermission::new(*t, id)).collect()
    }

    #[test]
    fn test_insert_is_idempotent() {
        let store = InMemoryPermissionStore::new();
        let rows = grant(&[ObjectPermissionType::Read], "1");
        store
            .insert_object_permissions("alice", ObjectClass::Connection, &rows)
            .unwrap();
        store
            .insert_object_permissions("alice", ObjectClass::Connection, &rows)
            .unwrap();

        let stored = store
            .select_object_permissions("alice", ObjectClass::Connection)
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn test_classes_are_separate() {
        let store = InMemoryPermissionStore::new();
        store
            .insert_object_permissions(
                "alice",
                ObjectClass::Connection,
                &grant(&[ObjectPermissionType::Read], "1"),
            )
            .unwrap();

        let permission = ObjectPermission::new(ObjectPermissionType::Read, "1");
        assert!(store
            .has_object_permission("alice", ObjectClass::Connection, &permission)
            .unwrap());
        assert!(!store
            .has_object_permission("alice", ObjectClass::ConnectionGroup, &permission)
            .unwrap());
    }

    #[test]
    fn test_delete_object_removes_rows_of_all_subjects() {
        let store = InMemoryPermissionStore::new();
        let rows = grant(&[ObjectPermissionType::Read, ObjectPermissionType::Update], "7");
        store
            .insert_object_permissions("alice", ObjectClass::Connection, &rows)
            .unwrap();
        store
            .insert_object_permissions("bob", ObjectClass::Connection, &rows)
            .unwrap();

        store.delete_object(ObjectClass::Connection, "7").unwrap();

        assert!(store
            .select_object_permissions("alice", ObjectClass::Connection)
            .unwrap()
            .is_empty());
        assert!(store
            .select_object_permissions("bob", ObjectClass::Connection)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_read_only_stored_set_rejects_mutation() {
        let store: Arc<dyn PermissionStore> = Arc::new(InMemoryPermissionStore::new());
        let set = StoredObjectPermissionSet::read_only(store.clone(), "alice", ObjectClass::User);

        let result = set.add_permissions(&grant(&[ObjectPermissionType::Read], "bob"));
        assert!(result.is_err());
        assert!(store
            .select_object_permissions("alice", ObjectClass::User)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_stored_system_set_round_trip() {
        let store: Arc<dyn PermissionStore> = Arc::new(InMemoryPermissionStore::new());
        let set = StoredSystemPermissionSet::new(store, "admin");
        let rows: HashSet<_> = [SystemPermission::new(SystemPermissionType::Administer)]
            .into_iter()
            .collect();

        set.add_permissions(&rows).unwrap();
        assert!(set.has_permission(SystemPermissionType::Administer).unwrap());

        set.remove_permissions(&rows).unwrap();
        assert!(!set.has_permission(SystemPermissionType::Administer).unwrap());
    }
}
