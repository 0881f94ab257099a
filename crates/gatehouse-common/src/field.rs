//! Credential field metadata
//!
//! When an authentication attempt cannot complete without more input (for
//! example an expired password), the failure names the fields the caller
//! must supply on the next attempt.

use serde::{Deserialize, Serialize};

/// Kind of input a field expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    /// Plain username input
    Username,
    /// Masked password input
    Password,
    /// Free-form text input
    Text,
    /// Checkbox-style flag
    Boolean,
}

/// A named credential field the caller may be asked to provide
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Parameter name the value must be submitted under
    pub name: String,
    /// Input type of the field
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    /// Create a new field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Create a password field
    pub fn password(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Password)
    }

    /// Create a username field
    pub fn username(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Username)
    }
}
