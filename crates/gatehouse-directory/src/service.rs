//! Generic permission-gated CRUD over directory objects

use std::collections::HashSet;
use std::sync::Arc;

use gatehouse_permissions::{
    accessible_identifiers, has_permission, ObjectClass, ObjectPermission, ObjectPermissionType,
    PermissionStore, Subject,
};
use tracing::{debug, info};

use crate::{kind::ObjectKind, model::DirectoryObject, storage::ObjectStore, GatewayError, Result};

/// CRUD engine for one object kind
///
/// Reads are filtered by READ, and an object the caller cannot read is
/// reported as absent. Creation requires the kind's system permission and
/// grants the creator full rights over the new object.
pub struct DirectoryObjectService<K: ObjectKind> {
    kind: K,
    store: Arc<dyn ObjectStore<K::Object>>,
    permissions: Arc<dyn PermissionStore>,
}

impl<K: ObjectKind> DirectoryObjectService<K> {
    pub fn new(
        kind: K,
        store: Arc<dyn ObjectStore<K::Object>>,
        permissions: Arc<dyn PermissionStore>,
    ) -> Self {
        Self {
            kind,
            store,
            permissions,
        }
    }

    /// Underlying store, bypassing permission checks
    pub fn store(&self) -> &Arc<dyn ObjectStore<K::Object>> {
        &self.store
    }

    fn not_found(identifier: &str) -> GatewayError {
        GatewayError::not_found(format!("{} {} not found", K::LABEL, identifier))
    }

    fn can(
        &self,
        actor: &dyn Subject,
        permission: ObjectPermissionType,
        identifier: &str,
    ) -> Result<bool> {
        let set = actor.object_permissions(K::CLASS);
        has_permission(actor.is_administrator()?, set.as_ref(), permission, identifier)
    }

    /// Load an object the actor can read, or `NotFound`
    fn load_readable(&self, actor: &dyn Subject, identifier: &str) -> Result<K::Object> {
        if !self.can(actor, ObjectPermissionType::Read, identifier)? {
            return Err(Self::not_found(identifier));
        }
        self.store
            .select_one(identifier)?
            .ok_or_else(|| Self::not_found(identifier))
    }

    /// Create a new object on behalf of `actor`
    pub fn create(&self, actor: &dyn Subject, mut candidate: K::Object) -> Result<K::Object> {
        let is_admin = actor.is_administrator()?;
        if !is_admin
            && !actor
                .system_permissions()
                .has_permission(K::CREATE_PERMISSION)?
        {
            return Err(GatewayError::permission_denied(format!(
                "Not allowed to create {} objects",
                K::CLASS
            )));
        }

        self.kind.prepare(actor, &mut candidate, None)?;
        let created = self.store.insert(candidate)?;
        let identifier = created
            .identifier()
            .ok_or_else(|| GatewayError::internal("Store returned object without identifier"))?
            .to_string();

        let creator_grants: HashSet<ObjectPermission> = ObjectPermissionType::ALL
            .into_iter()
            .map(|t| ObjectPermission::new(t, identifier.clone()))
            .collect();
        self.permissions
            .insert_object_permissions(actor.identifier(), K::CLASS, &creator_grants)?;
        for (subject, grants) in self.kind.implicit_permissions(&created) {
            self.permissions
                .insert_object_permissions(&subject, K::CLASS, &grants)?;
        }

        info!(
            actor = actor.identifier(),
            class = %K::CLASS,
            identifier = %identifier,
            "Created directory object"
        );
        Ok(created)
    }

    /// Retrieve one object; unreadable and absent objects are both `NotFound`
    pub fn retrieve(&self, actor: &dyn Subject, identifier: &str) -> Result<K::Object> {
        self.load_readable(actor, identifier)
    }

    /// Retrieve every readable object among `identifiers` in one bulk pass
    pub fn retrieve_multiple(
        &self,
        actor: &dyn Subject,
        identifiers: &HashSet<String>,
    ) -> Result<Vec<K::Object>> {
        let readable = self.readable(actor, identifiers)?;
        if readable.is_empty() {
            return Ok(Vec::new());
        }
        self.store.select(&readable)
    }

    /// Members of `identifiers` the actor may read
    pub fn readable(
        &self,
        actor: &dyn Subject,
        identifiers: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        let set = actor.object_permissions(K::CLASS);
        accessible_identifiers(
            actor.is_administrator()?,
            set.as_ref(),
            &[ObjectPermissionType::Read],
            identifiers,
        )
    }

    /// Identifiers of every object the actor may read
    pub fn identifiers(&self, actor: &dyn Subject) -> Result<HashSet<String>> {
        let all = self.store.select_identifiers()?;
        self.readable(actor, &all)
    }

    /// Identifiers of readable objects directly beneath `parent`
    pub fn identifiers_within(&self, actor: &dyn Subject, parent: &str) -> Result<HashSet<String>> {
        let children = self.store.select_identifiers_within(parent)?;
        self.readable(actor, &children)
    }

    /// Replace a stored object
    pub fn update(&self, actor: &dyn Subject, mut object: K::Object) -> Result<()> {
        let identifier = object
            .identifier()
            .ok_or_else(|| GatewayError::invalid(format!("{} has no identifier", K::LABEL)))?
            .to_string();
        if self.kind.is_immutable(&identifier) {
            return Err(GatewayError::permission_denied(format!(
                "{} {} cannot be modified",
                K::LABEL,
                identifier
            )));
        }

        let existing = self.load_readable(actor, &identifier)?;
        if !self.can(actor, ObjectPermissionType::Update, &identifier)? {
            return Err(GatewayError::permission_denied(format!(
                "Not allowed to update {} {}",
                K::CLASS,
                identifier
            )));
        }

        self.kind.prepare(actor, &mut object, Some(&existing))?;
        self.store.update(&object)?;
        debug!(
            actor = actor.identifier(),
            class = %K::CLASS,
            identifier = %identifier,
            "Updated directory object"
        );
        Ok(())
    }

    /// Delete an object
    ///
    /// Open tunnels to a deleted connection stay valid until closed.
    pub fn delete(&self, actor: &dyn Subject, identifier: &str) -> Result<()> {
        if self.kind.is_immutable(identifier) {
            return Err(GatewayError::permission_denied(format!(
                "{} {} cannot be deleted",
                K::LABEL,
                identifier
            )));
        }

        let existing = self.load_readable(actor, identifier)?;
        if !self.can(actor, ObjectPermissionType::Delete, identifier)? {
            return Err(GatewayError::permission_denied(format!(
                "Not allowed to delete {} {}",
                K::CLASS,
                identifier
            )));
        }
        self.kind.before_delete(actor, &existing)?;

        if !self.store.delete(identifier)? {
            return Err(Self::not_found(identifier));
        }
        self.permissions.delete_object(K::CLASS, identifier)?;
        if K::CLASS == ObjectClass::User {
            self.permissions.delete_subject(identifier)?;
        }

        info!(
            actor = actor.identifier(),
            class = %K::CLASS,
            identifier,
            "Deleted directory object"
        );
        Ok(())
    }
}
