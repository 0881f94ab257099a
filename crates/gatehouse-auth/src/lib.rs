//! Authentication for gatehouse
//!
//! Providers are tried in declared order by the [`AuthenticationChain`]. The
//! first to recognise the credentials authenticates the user; every provider
//! may then contribute a [`UserContext`], so one login can span several
//! directories.

pub mod chain;
pub mod context;
pub mod credentials;
pub mod directory_provider;
pub mod provider;
pub mod quickconnect;

pub use chain::{AuthenticationChain, AuthenticationResult};
pub use context::{Form, UserContext};
pub use credentials::{AuthenticatedUser, Credentials};
pub use directory_provider::{
    DirectoryAuthenticationProvider, CONFIRM_NEW_PASSWORD_PARAMETER, NEW_PASSWORD_PARAMETER,
    PASSWORD_BLANK, PASSWORD_MISMATCH, PASSWORD_SAME,
};
pub use gatehouse_common::{GatewayError, Result};
pub use provider::AuthenticationProvider;
pub use quickconnect::{connection_from_uri, QuickConnectProvider, QUICKCONNECT_PROVIDER};
