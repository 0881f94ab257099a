//! Permissions for gatehouse
//!
//! Object and system permission sets, the pure resolver functions that answer
//! single and bulk authorization questions, a persistence trait with an
//! in-memory store, and the services that grant and revoke permissions on
//! behalf of an acting subject.

pub mod models;
pub mod resolver;
pub mod service;
pub mod set;
pub mod storage;
pub mod subject;

pub use gatehouse_common::{GatewayError, Result};
pub use models::{
    ObjectClass, ObjectPermission, ObjectPermissionType, SystemPermission, SystemPermissionType,
};
pub use resolver::{
    accessible_identifiers, can_alter_permissions, can_read_permissions, has_permission,
};
pub use service::{ObjectPermissionService, SystemPermissionService};
pub use set::{
    ObjectPermissionSet, SimpleObjectPermissionSet, SimpleSystemPermissionSet, SystemPermissionSet,
};
pub use storage::{
    InMemoryPermissionStore, PermissionStore, StoredObjectPermissionSet, StoredSystemPermissionSet,
};
pub use subject::{FixedSubject, StoredSubject, Subject};
