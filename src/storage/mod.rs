//! Storage abstraction layer for entity records.
//!
//! The [`EntityStore`] trait defines pure data operations on JSON records
//! keyed by entity type and identifier. It knows nothing about schemas,
//! payloads or validation; the [`EntityManager`](crate::manager::EntityManager)
//! turns entities into records and back.
//!
//! Writes happen only through [`EntityStore::commit`], which applies a batch
//! atomically after checking every write's expected version. This is where
//! optimistic locking conflicts surface.
//!
//! # Example Usage
//!
//! ```rust
//! use entity_configurator::entity::EntityVersion;
//! use entity_configurator::storage::{EntityStore, InMemoryStore, RecordWrite, StorageKey};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! let key = StorageKey::new("User", "1");
//! let data = json!({"type": "User", "id": [1], "fields": {"id": 1}});
//! let version = EntityVersion::from_content(data.to_string().as_bytes());
//!
//! store.commit(vec![RecordWrite::insert(key.clone(), data, version)]).await?;
//! assert!(store.get(&key).await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;


pub use errors::StorageError;
pub use in_memory::{InMemoryStore, InMemoryStoreStats};

use crate::entity::EntityVersion;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::future::Future;

/// Key of a stored record: entity type and canonical identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    entity_type: String,
    id: String,
}

impl StorageKey {
    /// Create a new storage key.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Get the entity type.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Get the canonical identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Listing order of canonical identifiers.
    ///
    /// Composite identifiers are compared part by part. Integer parts compare
    /// by value and sort before text parts, so `2` comes before `10`.
    pub fn compare_ids(left: &str, right: &str) -> Ordering {
        let (left_parts, right_parts) = (id_parts(left), id_parts(right));
        left_parts
            .iter()
            .zip(&right_parts)
            .map(|(l, r)| match (l.parse::<i64>(), r.parse::<i64>()) {
                (Ok(l), Ok(r)) => l.cmp(&r),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => l.cmp(r),
            })
            .find(|order| order.is_ne())
            .unwrap_or_else(|| left_parts.len().cmp(&right_parts.len()))
            .then_with(|| left.cmp(right))
    }
}

/// Split a canonical identifier on its unescaped `:` separators.
fn id_parts(id: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (index, c) in id.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ':' => {
                parts.push(&id[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&id[start..]);
    parts
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// A stored record with its version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRecord {
    pub data: Value,
    pub version: EntityVersion,
}

/// One write of a commit batch.
#[derive(Debug, Clone)]
pub struct RecordWrite {
    pub key: StorageKey,
    pub data: Value,
    /// Version the record must currently have; `None` means the record
    /// must not exist yet.
    pub expected_version: Option<EntityVersion>,
    /// Version to store with the new data.
    pub version: EntityVersion,
}

impl RecordWrite {
    /// Write for a record that must not exist yet.
    pub fn insert(key: StorageKey, data: Value, version: EntityVersion) -> Self {
        Self {
            key,
            data,
            expected_version: None,
            version,
        }
    }

    /// Write replacing a record currently at `expected_version`.
    pub fn update(
        key: StorageKey,
        data: Value,
        expected_version: EntityVersion,
        version: EntityVersion,
    ) -> Self {
        Self {
            key,
            data,
            expected_version: Some(expected_version),
            version,
        }
    }
}

/// Core trait for stores that persist entity records.
///
/// # Design Principles
///
/// - **GET/COMMIT Model**: records are read one by one and written in atomic batches
/// - **Versioned Writes**: every write states the version it expects to replace
/// - **Protocol Agnostic**: no awareness of schemas or validation
/// - **Async First**: all operations return futures
pub trait EntityStore: Send + Sync {
    /// The error type returned by storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Retrieve a record by key.
    ///
    /// # Returns
    /// `Some(record)` if the record exists, `None` if it doesn't.
    fn get(
        &self,
        key: &StorageKey,
    ) -> impl Future<Output = Result<Option<VersionedRecord>, Self::Error>> + Send;

    /// Apply a batch of writes atomically.
    ///
    /// # Behavior
    /// - Every write's `expected_version` is checked before anything is applied
    /// - A mismatch fails the whole batch with a conflict and writes nothing
    fn commit(
        &self,
        writes: Vec<RecordWrite>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next value of the per-type identifier sequence, starting at 1.
    fn next_sequence(
        &self,
        entity_type: &str,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    /// List records of one type ordered by [`StorageKey::compare_ids`], with
    /// pagination.
    fn list(
        &self,
        entity_type: &str,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<(StorageKey, VersionedRecord)>, Self::Error>> + Send;

    /// Count the records of one type.
    fn count(&self, entity_type: &str) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    /// Remove all records and reset sequences.
    fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_storage_key() {
        let key = StorageKey::new("User", "123");
        assert_eq!(key.entity_type(), "User");
        assert_eq!(key.id(), "123");
        assert_eq!(key.to_string(), "User/123");
    }

    #[test]
    fn test_ids_order_numerically() {
        let mut ids = vec!["10", "b", "2", "1:core", "1:admin", "a\\:z", "11", "1"];
        ids.sort_by(|l, r| StorageKey::compare_ids(l, r));
        assert_eq!(ids, vec!["1", "1:admin", "1:core", "2", "10", "11", "a\\:z", "b"]);
    }
}
