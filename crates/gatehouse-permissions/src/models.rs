//! Permission value types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Rights a subject may hold over a single object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectPermissionType {
    /// See the object and connect to it
    Read,
    /// Modify the object
    Update,
    /// Remove the object
    Delete,
    /// Grant and revoke permissions on the object
    Administer,
}

impl ObjectPermissionType {
    /// All object permission types
    pub const ALL: [ObjectPermissionType; 4] = [
        ObjectPermissionType::Read,
        ObjectPermissionType::Update,
        ObjectPermissionType::Delete,
        ObjectPermissionType::Administer,
    ];
}

/// Rights a subject may hold over the system as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemPermissionType {
    /// Unrestricted access to everything
    Administer,
    CreateUser,
    CreateConnection,
    CreateConnectionGroup,
}

/// Object class a permission set ranges over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    User,
    Connection,
    ConnectionGroup,
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectClass::User => "user",
            ObjectClass::Connection => "connection",
            ObjectClass::ConnectionGroup => "connection group",
        };
        f.write_str(name)
    }
}

/// A right over one object, identified within its object class
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectPermission {
    /// Granted right
    #[serde(rename = "type")]
    pub permission_type: ObjectPermissionType,
    /// Identifier of the object the right applies to
    pub identifier: String,
}

impl ObjectPermission {
    /// Create a new object permission
    pub fn new(permission_type: ObjectPermissionType, identifier: impl Into<String>) -> Self {
        Self {
            permission_type,
            identifier: identifier.into(),
        }
    }
}

/// A system-wide right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemPermission {
    #[serde(rename = "type")]
    pub permission_type: SystemPermissionType,
}

impl SystemPermission {
    pub fn new(permission_type: SystemPermissionType) -> Self {
        Self { permission_type }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_serialization() {
        let permission = ObjectPermission::new(ObjectPermissionType::Administer, "42");
        let json = serde_json::to_value(&permission).unwrap();
        assert_eq!(json["type"], "ADMINISTER");
        assert_eq!(json["identifier"], "42");

        let system = SystemPermission::new(SystemPermissionType::CreateConnectionGroup);
        let json = serde_json::to_value(system).unwrap();
        assert_eq!(json["type"], "CREATE_CONNECTION_GROUP");
    }

    #[test]
    fn test_permission_equality_is_by_value() {
        let a = ObjectPermission::new(ObjectPermissionType::Read, "1");
        let b = ObjectPermission::new(ObjectPermissionType::Read, "1");
        let c = ObjectPermission::new(ObjectPermissionType::Update, "1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
