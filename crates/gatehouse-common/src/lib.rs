//! Shared building blocks for gatehouse crates
//!
//! Provides the gateway-wide error taxonomy, credential field metadata used
//! by authentication continuations, and tracing initialisation.

pub mod error;
pub mod field;
pub mod logging;

pub use error::{ErrorKind, GatewayError, Result};
pub use field::{Field, FieldType};
