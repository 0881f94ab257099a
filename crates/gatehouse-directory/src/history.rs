//! Connection usage history
//!
//! Each tunnel to a historized connection produces one [`ConnectionRecord`],
//! written when the tunnel opens and completed with an end date when it
//! closes. Records are searched with an immutable [`ConnectionRecordQuery`].

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GatewayError, Result};

/// Identifier of a stored record
pub type RecordId = u64;

/// One use of a connection, finished or in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Identifier of the connection at the time of use
    pub connection_identifier: String,
    /// Name of the connection at the time of use
    pub connection_name: String,
    pub username: String,
    pub remote_host: Option<String>,
    pub start_date: DateTime<Utc>,
    /// `None` while the connection is still in use
    pub end_date: Option<DateTime<Utc>>,
}

impl ConnectionRecord {
    pub fn is_active(&self) -> bool {
        self.end_date.is_none()
    }

    fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.username.to_lowercase().contains(&term)
            || self.connection_name.to_lowercase().contains(&term)
    }
}

/// Property a query can sort by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSortKey {
    StartDate,
    EndDate,
    Username,
    ConnectionName,
}

/// Persistence for connection records
pub trait HistoryStore: Send + Sync {
    /// Store a new record
    fn insert(&self, record: ConnectionRecord) -> Result<RecordId>;

    /// Set the end date of a record that has none yet
    fn finish(&self, id: RecordId, end_date: DateTime<Utc>) -> Result<()>;

    /// Every record, in insertion order
    fn select_all(&self) -> Result<Vec<ConnectionRecord>>;
}

/// In-memory history store
#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<Vec<ConnectionRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> GatewayError {
    GatewayError::internal(format!("History store lock poisoned: {}", e))
}

impl HistoryStore for InMemoryHistoryStore {
    fn insert(&self, record: ConnectionRecord) -> Result<RecordId> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.push(record);
        Ok((records.len() - 1) as RecordId)
    }

    fn finish(&self, id: RecordId, end_date: DateTime<Utc>) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        let record = records
            .get_mut(id as usize)
            .ok_or_else(|| GatewayError::not_found(format!("History record {} not found", id)))?;
        if record.end_date.is_some() {
            return Err(GatewayError::conflict(format!(
                "History record {} is already complete",
                id
            )));
        }
        record.end_date = Some(end_date);
        Ok(())
    }

    fn select_all(&self) -> Result<Vec<ConnectionRecord>> {
        Ok(self.records.read().map_err(poisoned)?.clone())
    }
}

/// Immutable query over connection records
///
/// Each builder method returns a new query; nothing runs until
/// [`execute`](Self::execute). Without explicit sorting, records come newest
/// first.
#[derive(Debug, Clone)]
pub struct ConnectionRecordQuery {
    connection_identifier: Option<String>,
    contains: Vec<String>,
    sort: Vec<(RecordSortKey, bool)>,
    limit: usize,
}

impl ConnectionRecordQuery {
    /// Create a query returning at most `max_records` records
    pub fn new(max_records: usize) -> Self {
        Self {
            connection_identifier: None,
            contains: Vec::new(),
            sort: Vec::new(),
            limit: max_records,
        }
    }

    /// Restrict to records of one connection
    pub fn for_connection(mut self, identifier: impl Into<String>) -> Self {
        self.connection_identifier = Some(identifier.into());
        self
    }

    /// Require the username or connection name to contain `term`, ignoring case
    pub fn contains(mut self, term: impl Into<String>) -> Self {
        self.contains.push(term.into());
        self
    }

    /// Lower the record limit; a limit above the current one has no effect
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = self.limit.min(limit);
        self
    }

    /// Add a sort criterion; earlier criteria take precedence
    pub fn sort(mut self, key: RecordSortKey, descending: bool) -> Self {
        self.sort.push((key, descending));
        self
    }

    pub fn current_limit(&self) -> usize {
        self.limit
    }

    /// Run the query against `store`
    pub fn execute(&self, store: &dyn HistoryStore) -> Result<Vec<ConnectionRecord>> {
        let mut records: Vec<ConnectionRecord> = store
            .select_all()?
            .into_iter()
            .filter(|record| {
                self.connection_identifier
                    .as_ref()
                    .map_or(true, |id| &record.connection_identifier == id)
            })
            .filter(|record| self.contains.iter().all(|term| record.matches(term)))
            .collect();

        if self.sort.is_empty() {
            records.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        } else {
            records.sort_by(|a, b| {
                self.sort
                    .iter()
                    .map(|(key, descending)| {
                        let ordering = match key {
                            RecordSortKey::StartDate => a.start_date.cmp(&b.start_date),
                            RecordSortKey::EndDate => a.end_date.cmp(&b.end_date),
                            RecordSortKey::Username => a.username.cmp(&b.username),
                            RecordSortKey::ConnectionName => {
                                a.connection_name.cmp(&b.connection_name)
                            }
                        };
                        if *descending {
                            ordering.reverse()
                        } else {
                            ordering
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        records.truncate(self.limit);
        Ok(records)
    }
}
