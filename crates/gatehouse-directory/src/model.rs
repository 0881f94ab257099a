//! Directory object types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Reserved identifier of the synthetic root connection group
pub const ROOT_IDENTIFIER: &str = "ROOT";

/// Arbitrary string attributes attached to an object
pub type Attributes = HashMap<String, String>;

/// User attribute mirroring [`User::disabled`]; `"true"` or absent
pub const DISABLED_ATTRIBUTE: &str = "disabled";

/// User attribute mirroring [`User::expired`]; `"true"` or absent
pub const EXPIRED_ATTRIBUTE: &str = "expired";

/// Behaviour shared by every object a directory stores
pub trait DirectoryObject: Clone + Send + Sync + 'static {
    /// Identifier, absent until the object is persisted
    fn identifier(&self) -> Option<&str>;

    fn set_identifier(&mut self, identifier: String);

    /// Name that must be unique within the parent scope
    fn name(&self) -> &str;

    /// Parent group, `None` for objects without a parent scope
    fn parent_identifier(&self) -> Option<&str>;

    fn attributes(&self) -> &Attributes;
}

/// A user account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Username, which doubles as the identifier
    pub username: String,
    /// Plaintext password; hashed and cleared before storage
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    /// PHC-format salted hash of the password
    #[serde(skip)]
    pub password_hash: Option<String>,
    /// Disabled accounts cannot log in
    pub disabled: bool,
    /// Expired accounts must choose a new password on next login
    pub expired: bool,
    pub attributes: Attributes,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn expired(mut self, expired: bool) -> Self {
        self.set_expired(expired);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.set_disabled(disabled);
        self
    }

    /// Set the flag and its attribute together
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
        set_flag_attribute(&mut self.attributes, DISABLED_ATTRIBUTE, disabled);
    }

    /// Set the flag and its attribute together
    pub fn set_expired(&mut self, expired: bool) {
        self.expired = expired;
        set_flag_attribute(&mut self.attributes, EXPIRED_ATTRIBUTE, expired);
    }
}

fn set_flag_attribute(attributes: &mut Attributes, name: &str, value: bool) {
    if value {
        attributes.insert(name.to_string(), "true".to_string());
    } else {
        attributes.remove(name);
    }
}

impl DirectoryObject for User {
    fn identifier(&self) -> Option<&str> {
        if self.username.is_empty() {
            None
        } else {
            Some(&self.username)
        }
    }

    fn set_identifier(&mut self, identifier: String) {
        self.username = identifier;
    }

    fn name(&self) -> &str {
        &self.username
    }

    fn parent_identifier(&self) -> Option<&str> {
        None
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// A remote desktop or console connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub identifier: Option<String>,
    pub name: String,
    /// Parent group; `None` is read as the root group
    pub parent_identifier: Option<String>,
    /// Protocol spoken by the proxy daemon, e.g. `rdp`
    pub protocol: String,
    /// Protocol parameters handed to the proxy daemon
    pub parameters: HashMap<String, String>,
    pub attributes: Attributes,
}

impl Connection {
    pub fn new(name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            ..Self::default()
        }
    }

    pub fn within(mut self, parent: impl Into<String>) -> Self {
        self.parent_identifier = Some(parent.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

impl DirectoryObject for Connection {
    fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    fn set_identifier(&mut self, identifier: String) {
        self.identifier = Some(identifier);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent_identifier(&self) -> Option<&str> {
        Some(self.parent_identifier.as_deref().unwrap_or(ROOT_IDENTIFIER))
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// How a connection group behaves when connected to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupType {
    /// Purely for organisation; cannot be connected to
    #[default]
    Organizational,
    /// Connecting picks one child connection by policy
    Balancing,
}

/// A group of connections and other groups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionGroup {
    pub identifier: Option<String>,
    pub name: String,
    /// Parent group; `None` only for the root group once stored
    pub parent_identifier: Option<String>,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub attributes: Attributes,
}

impl ConnectionGroup {
    pub fn new(name: impl Into<String>, group_type: GroupType) -> Self {
        Self {
            name: name.into(),
            group_type,
            ..Self::default()
        }
    }

    pub fn within(mut self, parent: impl Into<String>) -> Self {
        self.parent_identifier = Some(parent.into());
        self
    }

    /// The synthetic root group
    pub fn root() -> Self {
        Self {
            identifier: Some(ROOT_IDENTIFIER.to_string()),
            name: ROOT_IDENTIFIER.to_string(),
            parent_identifier: None,
            group_type: GroupType::Organizational,
            attributes: Attributes::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.identifier.as_deref() == Some(ROOT_IDENTIFIER)
    }
}

impl DirectoryObject for ConnectionGroup {
    fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    fn set_identifier(&mut self, identifier: String) {
        self.identifier = Some(identifier);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent_identifier(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(self.parent_identifier.as_deref().unwrap_or(ROOT_IDENTIFIER))
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}
