//! Per-provider views of an authenticated user

use std::sync::Arc;

use gatehouse_common::Field;
use gatehouse_directory::Directory;
use gatehouse_permissions::Subject;
use serde::{Deserialize, Serialize};

/// A named group of attribute fields describing object metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Form {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// One provider's view of the directory available to a user
///
/// A context names its user rather than owning the authenticated identity;
/// the session holding the context owns both.
pub struct UserContext {
    provider: String,
    username: String,
    subject: Arc<dyn Subject>,
    directory: Arc<Directory>,
    user_attributes: Vec<Form>,
}

impl UserContext {
    pub fn new(
        provider: impl Into<String>,
        username: impl Into<String>,
        subject: Arc<dyn Subject>,
        directory: Arc<Directory>,
    ) -> Self {
        Self {
            provider: provider.into(),
            username: username.into(),
            subject,
            directory,
            user_attributes: Vec::new(),
        }
    }

    pub fn with_user_attributes(mut self, forms: Vec<Form>) -> Self {
        self.user_attributes = forms;
        self
    }

    /// Identifier of the provider that produced this context
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The user as a permission subject within this provider
    pub fn subject(&self) -> &dyn Subject {
        self.subject.as_ref()
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Attribute schema for user objects
    pub fn user_attributes(&self) -> &[Form] {
        &self.user_attributes
    }
}

impl std::fmt::Debug for UserContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserContext")
            .field("provider", &self.provider)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
