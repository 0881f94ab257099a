//! Directory of users, connections and connection groups
//!
//! Every object kind is served by one generic [`DirectoryObjectService`],
//! parameterised by an [`ObjectKind`] descriptor carrying the kind-specific
//! validation, deletion guards and implicit permissions. The connection
//! hierarchy, including the synthetic root group, is exposed through
//! [`ConnectionTree`]; usage history through [`ConnectionRecordQuery`].

pub mod balancing;
pub mod directory;
pub mod history;
pub mod kind;
pub mod model;
pub mod password;
pub mod service;
pub mod storage;
pub mod tree;

pub use balancing::{BalancingPolicy, ConnectionUsage, LeastActivePolicy};
pub use directory::{Directory, DirectoryStores};
pub use gatehouse_common::{GatewayError, Result};
pub use history::{
    ConnectionRecord, ConnectionRecordQuery, HistoryStore, InMemoryHistoryStore, RecordId,
    RecordSortKey,
};
pub use kind::{ConnectionGroupKind, ConnectionKind, ObjectKind, UserKind};
pub use model::{
    Attributes, Connection, ConnectionGroup, DirectoryObject, GroupType, User, DISABLED_ATTRIBUTE,
    EXPIRED_ATTRIBUTE, ROOT_IDENTIFIER,
};
pub use password::{Argon2PasswordEncryption, PasswordEncryption};
pub use service::DirectoryObjectService;
pub use storage::{IdentifierStrategy, InMemoryObjectStore, ObjectStore};
pub use tree::{Children, ConnectionTree};
