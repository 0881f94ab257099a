//! Object persistence
//!
//! [`ObjectStore`] is the persistence boundary for directory objects. It owns
//! identifier assignment and enforces uniqueness of (parent, name)
//! atomically, so a rename racing another rename surfaces as `Conflict` from
//! the store rather than slipping past a service-level pre-check.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use uuid::Uuid;

use crate::{model::DirectoryObject, GatewayError, Result};

/// Repository trait for directory objects of one kind
pub trait ObjectStore<T: DirectoryObject>: Send + Sync {
    /// Bulk select by identifier; unknown identifiers are skipped
    fn select(&self, identifiers: &HashSet<String>) -> Result<Vec<T>>;

    fn select_one(&self, identifier: &str) -> Result<Option<T>>;

    /// Identifiers of every stored object
    fn select_identifiers(&self) -> Result<HashSet<String>>;

    /// Identifiers of objects whose parent is `parent`
    fn select_identifiers_within(&self, parent: &str) -> Result<HashSet<String>>;

    /// Persist a new object under a store-assigned identifier
    fn insert(&self, object: T) -> Result<T>;

    /// Replace a stored object
    fn update(&self, object: &T) -> Result<()>;

    /// Remove an object, returning whether it existed
    fn delete(&self, identifier: &str) -> Result<bool>;
}

/// How an in-memory store assigns identifiers to new objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierStrategy {
    /// Increasing decimal numbers, starting at 1
    Sequential,
    /// Random UUIDs
    Random,
    /// The object's own name
    Natural,
}

/// In-memory object store
pub struct InMemoryObjectStore<T> {
    objects: RwLock<BTreeMap<String, T>>,
    strategy: IdentifierStrategy,
    next_id: AtomicU64,
    label: &'static str,
}

impl<T: DirectoryObject> InMemoryObjectStore<T> {
    /// Create a store; `label` names the object kind in error messages
    pub fn new(strategy: IdentifierStrategy, label: &'static str) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            strategy,
            next_id: AtomicU64::new(1),
            label,
        }
    }

    fn next_identifier(&self, object: &T) -> String {
        match self.strategy {
            IdentifierStrategy::Sequential => {
                self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
            }
            IdentifierStrategy::Random => Uuid::new_v4().to_string(),
            IdentifierStrategy::Natural => object.name().to_string(),
        }
    }

    fn name_taken(objects: &BTreeMap<String, T>, object: &T, except: Option<&str>) -> bool {
        objects.iter().any(|(id, other)| {
            Some(id.as_str()) != except
                && other.parent_identifier() == object.parent_identifier()
                && other.name() == object.name()
        })
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> GatewayError {
    GatewayError::internal(format!("Object store lock poisoned: {}", e))
}

impl<T: DirectoryObject> ObjectStore<T> for InMemoryObjectStore<T> {
    fn select(&self, identifiers: &HashSet<String>) -> Result<Vec<T>> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(identifiers
            .iter()
            .filter_map(|id| objects.get(id).cloned())
            .collect())
    }

    fn select_one(&self, identifier: &str) -> Result<Option<T>> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.get(identifier).cloned())
    }

    fn select_identifiers(&self) -> Result<HashSet<String>> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.keys().cloned().collect())
    }

    fn select_identifiers_within(&self, parent: &str) -> Result<HashSet<String>> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects
            .iter()
            .filter(|(_, object)| object.parent_identifier() == Some(parent))
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn insert(&self, mut object: T) -> Result<T> {
        let mut objects = self.objects.write().map_err(poisoned)?;

        if Self::name_taken(&objects, &object, None) {
            return Err(GatewayError::conflict(format!(
                "{} \"{}\" already exists",
                self.label,
                object.name()
            )));
        }

        // Identifiers are always assigned here, never taken from the caller
        let identifier = self.next_identifier(&object);
        if objects.contains_key(&identifier) {
            return Err(GatewayError::conflict(format!(
                "{} \"{}\" already exists",
                self.label, identifier
            )));
        }

        object.set_identifier(identifier.clone());
        objects.insert(identifier, object.clone());
        Ok(object)
    }

    fn update(&self, object: &T) -> Result<()> {
        let identifier = object
            .identifier()
            .ok_or_else(|| GatewayError::invalid(format!("{} has no identifier", self.label)))?;
        let mut objects = self.objects.write().map_err(poisoned)?;

        if !objects.contains_key(identifier) {
            return Err(GatewayError::not_found(format!(
                "{} {} not found",
                self.label, identifier
            )));
        }
        if Self::name_taken(&objects, object, Some(identifier)) {
            return Err(GatewayError::conflict(format!(
                "{} \"{}\" already exists",
                self.label,
                object.name()
            )));
        }

        objects.insert(identifier.to_string(), object.clone());
        Ok(())
    }

    fn delete(&self, identifier: &str) -> Result<bool> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        Ok(objects.remove(identifier).is_some())
    }
}
