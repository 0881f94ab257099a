//! The connection hierarchy
//!
//! Connections and groups form a tree under the synthetic root group, which
//! has no stored row, is always readable and can never be modified. Each
//! level is filtered by READ on the objects at that level only; an
//! unreadable group does not hide readable descendants from direct lookup.

use std::collections::HashSet;
use std::sync::Arc;

use gatehouse_permissions::Subject;

use crate::{
    history::{ConnectionRecord, ConnectionRecordQuery, HistoryStore},
    kind::{ConnectionGroupKind, ConnectionKind},
    model::{Connection, ConnectionGroup, DirectoryObject, GroupType, ROOT_IDENTIFIER},
    service::DirectoryObjectService,
    GatewayError, Result,
};

/// Readable children of one group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children {
    pub connection_identifiers: HashSet<String>,
    pub group_identifiers: HashSet<String>,
}

/// Navigates connections and connection groups as a tree
#[derive(Clone)]
pub struct ConnectionTree {
    connections: Arc<DirectoryObjectService<ConnectionKind>>,
    groups: Arc<DirectoryObjectService<ConnectionGroupKind>>,
    history: Option<Arc<dyn HistoryStore>>,
    history_limit: usize,
}

impl ConnectionTree {
    pub fn new(
        connections: Arc<DirectoryObjectService<ConnectionKind>>,
        groups: Arc<DirectoryObjectService<ConnectionGroupKind>>,
        history: Option<Arc<dyn HistoryStore>>,
        history_limit: usize,
    ) -> Self {
        Self {
            connections,
            groups,
            history,
            history_limit,
        }
    }

    pub fn root_group(&self) -> ConnectionGroup {
        ConnectionGroup::root()
    }

    /// A readable group; the root group is readable by everyone
    pub fn group(&self, actor: &dyn Subject, identifier: &str) -> Result<ConnectionGroup> {
        if identifier == ROOT_IDENTIFIER {
            return Ok(self.root_group());
        }
        self.groups.retrieve(actor, identifier)
    }

    pub fn connection(&self, actor: &dyn Subject, identifier: &str) -> Result<Connection> {
        self.connections.retrieve(actor, identifier)
    }

    /// Parent of a readable group, `None` for the root group
    pub fn parent_identifier(
        &self,
        actor: &dyn Subject,
        identifier: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .group(actor, identifier)?
            .parent_identifier()
            .map(str::to_string))
    }

    /// Readable connections and groups directly beneath `identifier`
    pub fn children_of(&self, actor: &dyn Subject, identifier: &str) -> Result<Children> {
        self.group(actor, identifier)?;
        Ok(Children {
            connection_identifiers: self.connections.identifiers_within(actor, identifier)?,
            group_identifiers: self.groups.identifiers_within(actor, identifier)?,
        })
    }

    pub fn create_connection(
        &self,
        actor: &dyn Subject,
        connection: Connection,
    ) -> Result<Connection> {
        self.connections.create(actor, connection)
    }

    pub fn create_group(
        &self,
        actor: &dyn Subject,
        group: ConnectionGroup,
    ) -> Result<ConnectionGroup> {
        self.groups.create(actor, group)
    }

    pub fn update_group(&self, actor: &dyn Subject, group: ConnectionGroup) -> Result<()> {
        self.groups.update(actor, group)
    }

    pub fn delete_group(&self, actor: &dyn Subject, identifier: &str) -> Result<()> {
        self.groups.delete(actor, identifier)
    }

    /// Readable child connections a balancing group may hand a connect to
    pub fn balancing_candidates(
        &self,
        actor: &dyn Subject,
        identifier: &str,
    ) -> Result<Vec<Connection>> {
        let group = self.group(actor, identifier)?;
        if group.group_type != GroupType::Balancing {
            return Err(GatewayError::permission_denied(format!(
                "Connection group {} cannot be connected to",
                identifier
            )));
        }

        let children = self.connections.store().select_identifiers_within(identifier)?;
        self.connections.retrieve_multiple(actor, &children)
    }

    /// Whether uses of this tree's connections are recorded
    pub fn historizes(&self) -> bool {
        self.history.is_some()
    }

    pub fn history_store(&self) -> Option<&Arc<dyn HistoryStore>> {
        self.history.as_ref()
    }

    /// Empty history query bounded by the configured limit
    pub fn history_query(&self) -> ConnectionRecordQuery {
        ConnectionRecordQuery::new(self.history_limit)
    }

    /// Usage history of a readable connection
    pub fn history(
        &self,
        actor: &dyn Subject,
        identifier: &str,
        query: ConnectionRecordQuery,
    ) -> Result<Vec<ConnectionRecord>> {
        self.connection(actor, identifier)?;
        match &self.history {
            Some(store) => query
                .for_connection(identifier)
                .limit(self.history_limit)
                .execute(store.as_ref()),
            None => Ok(Vec::new()),
        }
    }
}
