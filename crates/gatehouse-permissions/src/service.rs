//! Permission services
//!
//! Grant, revoke and inspect the permissions of a target user on behalf of an
//! acting subject. Object permission changes are gated by
//! [`can_alter_permissions`]; system permission changes require an
//! administrator.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::{
    models::{
        ObjectClass, ObjectPermission, ObjectPermissionType, SystemPermission,
        SystemPermissionType,
    },
    resolver::{accessible_identifiers, can_alter_permissions, can_read_permissions},
    storage::{PermissionStore, StoredObjectPermissionSet},
    subject::Subject,
    GatewayError, Result,
};

/// Manages object permissions of one object class
#[derive(Clone)]
pub struct ObjectPermissionService {
    store: Arc<dyn PermissionStore>,
    class: ObjectClass,
}

impl ObjectPermissionService {
    pub fn new(store: Arc<dyn PermissionStore>, class: ObjectClass) -> Self {
        Self { store, class }
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    /// All permissions `target` holds over this class
    pub fn retrieve_permissions(
        &self,
        actor: &dyn Subject,
        target: &str,
    ) -> Result<HashSet<ObjectPermission>> {
        if !can_read_permissions(actor, target)? {
            return Err(GatewayError::permission_denied(format!(
                "Cannot read permissions of {}",
                target
            )));
        }
        self.store.select_object_permissions(target, self.class)
    }

    /// Members of `identifiers` on which `target` holds any of `types`
    pub fn retrieve_accessible_identifiers(
        &self,
        actor: &dyn Subject,
        target: &str,
        types: &[ObjectPermissionType],
        identifiers: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        if identifiers.is_empty() {
            return Ok(HashSet::new());
        }
        if !can_read_permissions(actor, target)? {
            return Err(GatewayError::permission_denied(format!(
                "Cannot read permissions of {}",
                target
            )));
        }

        let target_is_admin = self
            .store
            .select_system_permissions(target)?
            .contains(&SystemPermission::new(SystemPermissionType::Administer));
        let set = StoredObjectPermissionSet::read_only(self.store.clone(), target, self.class);
        accessible_identifiers(target_is_admin, &set, types, identifiers)
    }

    /// Grant `permissions` to `target`
    pub fn create_permissions(
        &self,
        actor: &dyn Subject,
        target: &str,
        permissions: &HashSet<ObjectPermission>,
    ) -> Result<()> {
        self.check_alter(actor, target, permissions)?;
        self.store
            .insert_object_permissions(target, self.class, permissions)?;
        info!(
            actor = actor.identifier(),
            target,
            class = %self.class,
            count = permissions.len(),
            "Granted object permissions"
        );
        Ok(())
    }

    /// Revoke `permissions` from `target`
    pub fn delete_permissions(
        &self,
        actor: &dyn Subject,
        target: &str,
        permissions: &HashSet<ObjectPermission>,
    ) -> Result<()> {
        self.check_alter(actor, target, permissions)?;
        self.store
            .delete_object_permissions(target, self.class, permissions)?;
        info!(
            actor = actor.identifier(),
            target,
            class = %self.class,
            count = permissions.len(),
            "Revoked object permissions"
        );
        Ok(())
    }

    fn check_alter(
        &self,
        actor: &dyn Subject,
        target: &str,
        permissions: &HashSet<ObjectPermission>,
    ) -> Result<()> {
        if can_alter_permissions(actor, target, self.class, permissions)? {
            Ok(())
        } else {
            Err(GatewayError::permission_denied(format!(
                "Cannot alter {} permissions of {}",
                self.class, target
            )))
        }
    }
}

/// Manages system permissions
#[derive(Clone)]
pub struct SystemPermissionService {
    store: Arc<dyn PermissionStore>,
}

impl SystemPermissionService {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    pub fn retrieve_permissions(
        &self,
        actor: &dyn Subject,
        target: &str,
    ) -> Result<HashSet<SystemPermission>> {
        if !can_read_permissions(actor, target)? {
            return Err(GatewayError::permission_denied(format!(
                "Cannot read permissions of {}",
                target
            )));
        }
        self.store.select_system_permissions(target)
    }

    pub fn create_permissions(
        &self,
        actor: &dyn Subject,
        target: &str,
        permissions: &HashSet<SystemPermission>,
    ) -> Result<()> {
        self.check_admin(actor)?;
        self.store.insert_system_permissions(target, permissions)?;
        info!(actor = actor.identifier(), target, "Granted system permissions");
        Ok(())
    }

    pub fn delete_permissions(
        &self,
        actor: &dyn Subject,
        target: &str,
        permissions: &HashSet<SystemPermission>,
    ) -> Result<()> {
        self.check_admin(actor)?;
        self.store.delete_system_permissions(target, permissions)?;
        info!(actor = actor.identifier(), target, "Revoked system permissions");
        Ok(())
    }

    fn check_admin(&self, actor: &dyn Subject) -> Result<()> {
        if actor.is_administrator()? {
            Ok(())
        } else {
            Err(GatewayError::permission_denied(
                "Only administrators may alter system permissions",
            ))
        }
    }
}
