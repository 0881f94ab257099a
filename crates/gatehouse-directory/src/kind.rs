//! Object kind descriptors
//!
//! An [`ObjectKind`] tells [`DirectoryObjectService`](crate::DirectoryObjectService)
//! everything that differs between users, connections and connection groups:
//! which permission class and creation right apply, how candidates are
//! validated and normalised, which deletions are refused, and which extra
//! permissions a new object receives.

use std::collections::HashSet;
use std::sync::Arc;

use gatehouse_permissions::{
    has_permission, ObjectClass, ObjectPermission, ObjectPermissionType, Subject,
    SystemPermissionType,
};

use crate::{
    model::{
        Connection, ConnectionGroup, DirectoryObject, User, DISABLED_ATTRIBUTE,
        EXPIRED_ATTRIBUTE, ROOT_IDENTIFIER,
    },
    password::PasswordEncryption,
    storage::ObjectStore,
    GatewayError, Result,
};

/// Kind-specific behaviour of a directory object service
pub trait ObjectKind: Send + Sync + 'static {
    type Object: DirectoryObject;

    /// Permission class guarding objects of this kind
    const CLASS: ObjectClass;

    /// System permission needed to create objects of this kind
    const CREATE_PERMISSION: SystemPermissionType;

    /// Human readable kind name used in messages
    const LABEL: &'static str;

    /// Validate and normalise a candidate before it is stored
    ///
    /// `existing` is the stored version when updating.
    fn prepare(
        &self,
        actor: &dyn Subject,
        object: &mut Self::Object,
        existing: Option<&Self::Object>,
    ) -> Result<()>;

    /// Objects that exist without a stored row and can never be changed
    fn is_immutable(&self, _identifier: &str) -> bool {
        false
    }

    /// Refuse a deletion the caller is otherwise allowed to make
    fn before_delete(&self, _actor: &dyn Subject, _object: &Self::Object) -> Result<()> {
        Ok(())
    }

    /// Grants given on creation beyond the creator's own
    fn implicit_permissions(
        &self,
        _object: &Self::Object,
    ) -> Vec<(String, HashSet<ObjectPermission>)> {
        Vec::new()
    }
}

fn require_name(name: &str, message: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(GatewayError::invalid(message));
    }
    Ok(())
}

fn reject_reserved(identifier: Option<&str>) -> Result<()> {
    if identifier == Some(ROOT_IDENTIFIER) {
        return Err(GatewayError::invalid(format!(
            "\"{}\" is a reserved identifier",
            ROOT_IDENTIFIER
        )));
    }
    Ok(())
}

/// Drop a caller-chosen identifier so the store assigns one
fn clear_for_create(identifier: &mut Option<String>) -> Result<()> {
    reject_reserved(identifier.as_deref())?;
    *identifier = None;
    Ok(())
}

/// Parent must exist, be visible and be modifiable by the actor
fn check_parent(
    actor: &dyn Subject,
    groups: &dyn ObjectStore<ConnectionGroup>,
    parent: &str,
) -> Result<()> {
    if parent == ROOT_IDENTIFIER {
        return Ok(());
    }

    let is_admin = actor.is_administrator()?;
    let set = actor.object_permissions(ObjectClass::ConnectionGroup);
    if groups.select_one(parent)?.is_none()
        || !has_permission(is_admin, set.as_ref(), ObjectPermissionType::Read, parent)?
    {
        return Err(GatewayError::not_found(format!(
            "Connection group {} not found",
            parent
        )));
    }
    if !has_permission(is_admin, set.as_ref(), ObjectPermissionType::Update, parent)? {
        return Err(GatewayError::permission_denied(format!(
            "Cannot add objects to connection group {}",
            parent
        )));
    }
    Ok(())
}

fn parent_changed<T: DirectoryObject>(object: &T, existing: Option<&T>) -> bool {
    match existing {
        Some(existing) => existing.parent_identifier() != object.parent_identifier(),
        None => true,
    }
}

/// Reconcile a user flag with its attribute
///
/// On creation either one may set the flag. On update, whichever of the two
/// differs from the stored value wins, the field first; an absent attribute
/// reads as `false`.
fn resolve_flag(field: bool, attribute: Option<&String>, stored: Option<bool>) -> bool {
    let attribute = attribute.map(|value| value == "true");
    match stored {
        None => field || attribute == Some(true),
        Some(stored) if field != stored => field,
        Some(_) => attribute.unwrap_or(false),
    }
}

/// User accounts
pub struct UserKind {
    hasher: Arc<dyn PasswordEncryption>,
}

impl UserKind {
    pub fn new(hasher: Arc<dyn PasswordEncryption>) -> Self {
        Self { hasher }
    }
}

impl ObjectKind for UserKind {
    type Object = User;

    const CLASS: ObjectClass = ObjectClass::User;
    const CREATE_PERMISSION: SystemPermissionType = SystemPermissionType::CreateUser;
    const LABEL: &'static str = "User";

    fn prepare(
        &self,
        _actor: &dyn Subject,
        user: &mut User,
        existing: Option<&User>,
    ) -> Result<()> {
        require_name(&user.username, "The username must not be blank")?;

        let disabled = resolve_flag(
            user.disabled,
            user.attributes.get(DISABLED_ATTRIBUTE),
            existing.map(|e| e.disabled),
        );
        let expired = resolve_flag(
            user.expired,
            user.attributes.get(EXPIRED_ATTRIBUTE),
            existing.map(|e| e.expired),
        );
        user.set_disabled(disabled);
        user.set_expired(expired);

        match user.password.take() {
            Some(password) => user.password_hash = Some(self.hasher.hash(&password)?),
            None => {
                if let Some(existing) = existing {
                    user.password_hash = existing.password_hash.clone();
                }
            }
        }
        Ok(())
    }

    fn before_delete(&self, actor: &dyn Subject, user: &User) -> Result<()> {
        if actor.identifier() == user.username {
            return Err(GatewayError::permission_denied(
                "Deleting your own user is not allowed",
            ));
        }
        Ok(())
    }

    fn implicit_permissions(&self, user: &User) -> Vec<(String, HashSet<ObjectPermission>)> {
        let own = [ObjectPermissionType::Read, ObjectPermissionType::Update]
            .into_iter()
            .map(|t| ObjectPermission::new(t, user.username.clone()))
            .collect();
        vec![(user.username.clone(), own)]
    }
}

/// Connections
pub struct ConnectionKind {
    groups: Arc<dyn ObjectStore<ConnectionGroup>>,
}

impl ConnectionKind {
    pub fn new(groups: Arc<dyn ObjectStore<ConnectionGroup>>) -> Self {
        Self { groups }
    }
}

impl ObjectKind for ConnectionKind {
    type Object = Connection;

    const CLASS: ObjectClass = ObjectClass::Connection;
    const CREATE_PERMISSION: SystemPermissionType = SystemPermissionType::CreateConnection;
    const LABEL: &'static str = "Connection";

    fn prepare(
        &self,
        actor: &dyn Subject,
        connection: &mut Connection,
        existing: Option<&Connection>,
    ) -> Result<()> {
        require_name(&connection.name, "Connection names must not be blank")?;
        require_name(&connection.protocol, "Connections must specify a protocol")?;
        if existing.is_none() {
            clear_for_create(&mut connection.identifier)?;
        }

        let parent = connection
            .parent_identifier()
            .unwrap_or(ROOT_IDENTIFIER)
            .to_string();
        if parent_changed(connection, existing) {
            check_parent(actor, self.groups.as_ref(), &parent)?;
        }
        connection.parent_identifier = Some(parent);
        Ok(())
    }
}

/// Connection groups
pub struct ConnectionGroupKind {
    groups: Arc<dyn ObjectStore<ConnectionGroup>>,
    connections: Arc<dyn ObjectStore<Connection>>,
}

impl ConnectionGroupKind {
    pub fn new(
        groups: Arc<dyn ObjectStore<ConnectionGroup>>,
        connections: Arc<dyn ObjectStore<Connection>>,
    ) -> Self {
        Self {
            groups,
            connections,
        }
    }

    /// Refuse a parent that is the group itself or one of its descendants
    fn check_cycle(&self, identifier: &str, parent: &str) -> Result<()> {
        let mut visited = HashSet::new();
        let mut current = parent.to_string();

        while current != ROOT_IDENTIFIER && visited.insert(current.clone()) {
            if current == identifier {
                return Err(GatewayError::invalid(
                    "A connection group cannot be moved beneath itself",
                ));
            }
            current = match self.groups.select_one(&current)? {
                Some(group) => group
                    .parent_identifier()
                    .unwrap_or(ROOT_IDENTIFIER)
                    .to_string(),
                None => break,
            };
        }
        Ok(())
    }
}

impl ObjectKind for ConnectionGroupKind {
    type Object = ConnectionGroup;

    const CLASS: ObjectClass = ObjectClass::ConnectionGroup;
    const CREATE_PERMISSION: SystemPermissionType = SystemPermissionType::CreateConnectionGroup;
    const LABEL: &'static str = "Connection group";

    fn prepare(
        &self,
        actor: &dyn Subject,
        group: &mut ConnectionGroup,
        existing: Option<&ConnectionGroup>,
    ) -> Result<()> {
        require_name(&group.name, "Connection group names must not be blank")?;
        if existing.is_none() {
            clear_for_create(&mut group.identifier)?;
        } else {
            reject_reserved(group.identifier())?;
        }

        let parent = group
            .parent_identifier
            .clone()
            .unwrap_or_else(|| ROOT_IDENTIFIER.to_string());
        group.parent_identifier = Some(parent.clone());

        if parent_changed(group, existing) {
            check_parent(actor, self.groups.as_ref(), &parent)?;
            if let Some(identifier) = existing.and_then(|e| e.identifier()) {
                self.check_cycle(identifier, &parent)?;
            }
        }
        Ok(())
    }

    fn is_immutable(&self, identifier: &str) -> bool {
        identifier == ROOT_IDENTIFIER
    }

    fn before_delete(&self, _actor: &dyn Subject, group: &ConnectionGroup) -> Result<()> {
        let Some(identifier) = group.identifier() else {
            return Ok(());
        };
        let has_children = !self.connections.select_identifiers_within(identifier)?.is_empty()
            || !self.groups.select_identifiers_within(identifier)?.is_empty();
        if has_children {
            return Err(GatewayError::conflict(format!(
                "Connection group {} is not empty",
                identifier
            )));
        }
        Ok(())
    }
}
