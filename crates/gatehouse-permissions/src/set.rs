//! Permission sets
//!
//! A permission set holds the permissions of one subject over one object
//! class. Membership tests and bulk accessible-subset queries must always
//! agree: an identifier is in the accessible subset for some types exactly
//! when `has_permission` is true for at least one of those types.

use std::collections::HashSet;

use crate::{
    models::{ObjectPermission, ObjectPermissionType, SystemPermission, SystemPermissionType},
    GatewayError, Result,
};

/// Permissions of one subject over one object class
pub trait ObjectPermissionSet: Send + Sync {
    /// Whether the subject holds `permission` on `identifier`
    fn has_permission(&self, permission: ObjectPermissionType, identifier: &str) -> Result<bool>;

    /// Subset of `identifiers` on which at least one of `types` is held
    ///
    /// Implementations must never return an identifier outside `identifiers`.
    fn accessible_objects(
        &self,
        types: &[ObjectPermissionType],
        identifiers: &HashSet<String>,
    ) -> Result<HashSet<String>>;

    /// Every permission in the set
    fn permissions(&self) -> Result<HashSet<ObjectPermission>>;

    /// Add permissions to the set
    fn add_permissions(&self, permissions: &HashSet<ObjectPermission>) -> Result<()>;

    /// Remove permissions from the set
    fn remove_permissions(&self, permissions: &HashSet<ObjectPermission>) -> Result<()>;
}

/// System-wide permissions of one subject
pub trait SystemPermissionSet: Send + Sync {
    fn has_permission(&self, permission: SystemPermissionType) -> Result<bool>;

    fn permissions(&self) -> Result<HashSet<SystemPermission>>;

    fn add_permissions(&self, permissions: &HashSet<SystemPermission>) -> Result<()>;

    fn remove_permissions(&self, permissions: &HashSet<SystemPermission>) -> Result<()>;
}

fn read_only() -> GatewayError {
    GatewayError::permission_denied("Permission set is read-only")
}

/// Immutable object permission set backed by a fixed collection
///
/// Every mutator fails with `PermissionDenied` and leaves the set untouched.
#[derive(Debug, Clone, Default)]
pub struct SimpleObjectPermissionSet {
    permissions: HashSet<ObjectPermission>,
}

impl SimpleObjectPermissionSet {
    pub fn new(permissions: impl IntoIterator<Item = ObjectPermission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Grant each of `types` on every identifier in `identifiers`
    pub fn granting(
        types: &[ObjectPermissionType],
        identifiers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut permissions = HashSet::new();
        for identifier in identifiers {
            let identifier = identifier.into();
            for permission_type in types {
                permissions.insert(ObjectPermission::new(*permission_type, identifier.clone()));
            }
        }
        Self { permissions }
    }
}

impl ObjectPermissionSet for SimpleObjectPermissionSet {
    fn has_permission(&self, permission: ObjectPermissionType, identifier: &str) -> Result<bool> {
        Ok(self
            .permissions
            .contains(&ObjectPermission::new(permission, identifier)))
    }

    fn accessible_objects(
        &self,
        types: &[ObjectPermissionType],
        identifiers: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        Ok(self
            .permissions
            .iter()
            .filter(|p| types.contains(&p.permission_type) && identifiers.contains(&p.identifier))
            .map(|p| p.identifier.clone())
            .collect())
    }

    fn permissions(&self) -> Result<HashSet<ObjectPermission>> {
        Ok(self.permissions.clone())
    }

    fn add_permissions(&self, _permissions: &HashSet<ObjectPermission>) -> Result<()> {
        Err(read_only())
    }

    fn remove_permissions(&self, _permissions: &HashSet<ObjectPermission>) -> Result<()> {
        Err(read_only())
    }
}

/// Immutable system permission set backed by a fixed collection
#[derive(Debug, Clone, Default)]
pub struct SimpleSystemPermissionSet {
    permissions: HashSet<SystemPermission>,
}

impl SimpleSystemPermissionSet {
    pub fn new(permissions: impl IntoIterator<Item = SystemPermissionType>) -> Self {
        Self {
            permissions: permissions.into_iter().map(SystemPermission::new).collect(),
        }
    }
}

impl SystemPermissionSet for SimpleSystemPermissionSet {
    fn has_permission(&self, permission: SystemPermissionType) -> Result<bool> {
        Ok(self.permissions.contains(&SystemPermission::new(permission)))
    }

    fn permissions(&self) -> Result<HashSet<SystemPermission>> {
        Ok(self.permissions.clone())
    }

    fn add_permissions(&self, _permissions: &HashSet<SystemPermission>) -> Result<()> {
        Err(read_only())
    }

    fn remove_permissions(&self, _permissions: &HashSet<SystemPermission>) -> Result<()> {
        Err(read_only())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_common::ErrorKind;

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_accessible_objects_is_or_across_types() {
        let set = SimpleObjectPermissionSet::new([
            ObjectPermission::new(ObjectPermissionType::Read, "1"),
            ObjectPermission::new(ObjectPermissionType::Update, "2"),
            ObjectPermission::new(ObjectPermissionType::Delete, "3"),
        ]);

        let result = set
            .accessible_objects(
                &[ObjectPermissionType::Read, ObjectPermissionType::Update],
                &ids(&["1", "2", "3", "4"]),
            )
            .unwrap();
        assert_eq!(result, ids(&["1", "2"]));
    }

    #[test]
    fn test_accessible_objects_restricted_to_input() {
        let set = SimpleObjectPermissionSet::granting(&[ObjectPermissionType::Read], ["1", "2"]);
        let result = set
            .accessible_objects(&[ObjectPermissionType::Read], &ids(&["2"]))
            .unwrap();
        assert_eq!(result, ids(&["2"]));
    }

    #[test]
    fn test_simple_set_mutators_are_denied() {
        let set = SimpleObjectPermissionSet::granting(&[ObjectPermissionType::Read], ["1"]);
        let change: HashSet<_> = [ObjectPermission::new(ObjectPermissionType::Update, "1")]
            .into_iter()
            .collect();

        let err = set.add_permissions(&change).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(!set.has_permission(ObjectPermissionType::Update, "1").unwrap());

        let err = set.remove_permissions(&set.permissions().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(set.has_permission(ObjectPermissionType::Read, "1").unwrap());
    }

    #[test]
    fn test_simple_system_set() {
        let set = SimpleSystemPermissionSet::new([SystemPermissionType::CreateConnection]);
        assert!(set
            .has_permission(SystemPermissionType::CreateConnection)
            .unwrap());
        assert!(!set.has_permission(SystemPermissionType::Administer).unwrap());
        assert!(set.add_permissions(&HashSet::new()).is_err());
    }
}
