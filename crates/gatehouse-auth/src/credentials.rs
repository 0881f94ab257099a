//! Credentials and authenticated identities

use std::collections::HashMap;

/// Everything a caller submitted with one authentication attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Address the request originated from
    pub remote_address: Option<String>,
    /// Request parameters; a name may repeat
    pub parameters: HashMap<String, Vec<String>>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Credentials carrying no username or password
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// First value of a request parameter
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of a request parameter
    pub fn parameter_values(&self, name: &str) -> &[String] {
        self.parameters
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A user a provider has recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Username as known to the authenticating provider
    pub identifier: String,
    /// Identifier of the provider that authenticated the user
    pub provider: String,
    /// Credentials of the attempt that authenticated the user
    pub credentials: Credentials,
}

impl AuthenticatedUser {
    pub fn new(
        identifier: impl Into<String>,
        provider: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            provider: provider.into(),
            credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_parameters() {
        let credentials = Credentials::anonymous()
            .with_parameter("audio", "audio/L8")
            .with_parameter("audio", "audio/L16");

        assert_eq!(credentials.parameter("audio"), Some("audio/L8"));
        assert_eq!(credentials.parameter_values("audio").len(), 2);
        assert!(credentials.parameter_values("video").is_empty());
        assert_eq!(credentials.parameter("video"), None);
    }
}
