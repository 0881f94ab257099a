//! Gateway error taxonomy
//!
//! Every fallible gateway operation returns [`GatewayError`]. The variants map
//! one-to-one onto the failure kinds callers need to distinguish: denial,
//! masked absence, malformed input, duplicates, credential continuations and
//! backend outages.

use thiserror::Error;

use crate::field::Field;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors raised by gateway operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Caller is authenticated but lacks the required rights
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Object is absent, or the caller may not know that it exists
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input or credentials
    #[error("Invalid: {0}")]
    Invalid(String),

    /// Duplicate unique key or resource already in use
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Authentication needs additional fields before it can complete
    #[error("Insufficient credentials: {message}")]
    InsufficientCredentials {
        /// Human readable reason
        message: String,
        /// Fields the caller must supply
        fields: Vec<Field>,
    },

    /// Backend proxy or persistence collaborator failed
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Broken internal invariant, such as a poisoned lock
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Discriminant of [`GatewayError`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    NotFound,
    Invalid,
    Conflict,
    InsufficientCredentials,
    Unavailable,
    Internal,
}

impl GatewayError {
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an insufficient-credentials error naming the required fields
    pub fn insufficient_credentials(message: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::InsufficientCredentials {
            message: message.into(),
            fields,
        }
    }

    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InsufficientCredentials { .. } => ErrorKind::InsufficientCredentials,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-equivalent status code for this error
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::PermissionDenied | ErrorKind::InsufficientCredentials => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Invalid | ErrorKind::Conflict => 400,
            ErrorKind::Unavailable => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether the failed operation may be retried transparently
    ///
    /// Only backend outages qualify. Permission and validation failures are
    /// terminal for the request.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// Whether this error stems from the credentials a caller supplied
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Invalid | ErrorKind::InsufficientCredentials
        )
    }

    /// Required fields carried by an insufficient-credentials error
    pub fn required_fields(&self) -> &[Field] {
        match self {
            Self::InsufficientCredentials { fields, .. } => fields,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::permission_denied("x").status_code(), 403);
        assert_eq!(GatewayError::not_found("x").status_code(), 404);
        assert_eq!(GatewayError::invalid("x").status_code(), 400);
        assert_eq!(GatewayError::conflict("x").status_code(), 400);
        assert_eq!(GatewayError::unavailable("x").status_code(), 503);
        assert_eq!(GatewayError::internal("x").status_code(), 500);
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(GatewayError::unavailable("proxy down").is_retryable());
        assert!(!GatewayError::permission_denied("no").is_retryable());
        assert!(!GatewayError::conflict("dup").is_retryable());
        assert!(!GatewayError::invalid("bad").is_retryable());
    }

    #[test]
    fn test_required_fields() {
        let err = GatewayError::insufficient_credentials(
            "Password expired",
            vec![Field::new("new-password", FieldType::Password)],
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientCredentials);
        assert_eq!(err.required_fields().len(), 1);
        assert!(err.is_credential_error());
        assert!(GatewayError::not_found("x").required_fields().is_empty());
    }

    #[test]
    fn test_display() {
        let err = GatewayError::not_found("Connection 42");
        assert_eq!(err.to_string(), "Not found: Connection 42");
    }
}
