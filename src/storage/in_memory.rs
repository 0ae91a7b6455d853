//! In-memory entity store.
//!
//! Thread-safe implementation of [`EntityStore`] using nested `HashMap`s
//! behind a tokio `RwLock`. Intended for tests, development and embedding
//! where durability is not required.
//!
//! # Example Usage
//!
//! ```rust
//! use entity_configurator::storage::{EntityStore, InMemoryStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! assert_eq!(store.next_sequence("User").await?, 1);
//! assert_eq!(store.next_sequence("User").await?, 2);
//! assert_eq!(store.count("User").await?, 0);
//! # Ok(())
//! # }
//! ```

use crate::storage::{EntityStore, RecordWrite, StorageError, StorageKey, VersionedRecord};
use log::trace;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct StoreState {
    // entity_type -> id -> record
    records: HashMap<String, HashMap<String, VersionedRecord>>,
    sequences: HashMap<String, u64>,
}

/// Thread-safe in-memory store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get storage statistics for debugging and monitoring.
    pub async fn stats(&self) -> InMemoryStoreStats {
        let state = self.state.read().await;
        InMemoryStoreStats {
            entity_type_count: state.records.len(),
            total_records: state.records.values().map(HashMap::len).sum(),
        }
    }

    /// Get all entity types that currently have records.
    pub async fn list_entity_types(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut types: Vec<String> = state
            .records
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(entity_type, _)| entity_type.clone())
            .collect();
        types.sort();
        types
    }
}

impl EntityStore for InMemoryStore {
    type Error = StorageError;

    async fn get(&self, key: &StorageKey) -> Result<Option<VersionedRecord>, Self::Error> {
        let state = self.state.read().await;
        Ok(state
            .records
            .get(key.entity_type())
            .and_then(|records| records.get(key.id()))
            .cloned())
    }

    async fn commit(&self, writes: Vec<RecordWrite>) -> Result<(), Self::Error> {
        let mut state = self.state.write().await;

        // Check everything before applying anything
        for write in &writes {
            let current = state
                .records
                .get(write.key.entity_type())
                .and_then(|records| records.get(write.key.id()));
            match (&write.expected_version, current) {
                (None, None) => {}
                (None, Some(_)) => {
                    return Err(StorageError::record_already_exists(
                        write.key.entity_type(),
                        write.key.id(),
                    ));
                }
                (Some(expected), Some(current)) if *expected == current.version => {}
                (Some(expected), current) => {
                    return Err(StorageError::concurrent_modification(
                        write.key.entity_type(),
                        write.key.id(),
                        Some(expected.to_string()),
                        current.map(|record| record.version.to_string()),
                    ));
                }
            }
        }

        for write in writes {
            trace!("Writing record {} at version {}", write.key, write.version);
            state
                .records
                .entry(write.key.entity_type().to_string())
                .or_default()
                .insert(
                    write.key.id().to_string(),
                    VersionedRecord {
                        data: write.data,
                        version: write.version,
                    },
                );
        }

        Ok(())
    }

    async fn next_sequence(&self, entity_type: &str) -> Result<u64, Self::Error> {
        let mut state = self.state.write().await;
        let sequence = state.sequences.entry(entity_type.to_string()).or_insert(0);
        *sequence += 1;
        Ok(*sequence)
    }

    async fn list(
        &self,
        entity_type: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(StorageKey, VersionedRecord)>, Self::Error> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let Some(records) = state.records.get(entity_type) else {
            return Ok(Vec::new());
        };

        let mut ids: Vec<&String> = records.keys().collect();
        ids.sort_by(|left, right| StorageKey::compare_ids(left, right));

        Ok(ids
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| {
                records
                    .get(id)
                    .map(|record| (StorageKey::new(entity_type, id.as_str()), record.clone()))
            })
            .collect())
    }

    async fn count(&self, entity_type: &str) -> Result<usize, Self::Error> {
        let state = self.state.read().await;
        Ok(state.records.get(entity_type).map_or(0, HashMap::len))
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        let mut state = self.state.write().await;
        state.records.clear();
        state.sequences.clear();
        Ok(())
    }
}

/// Statistics about the current state of in-memory storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryStoreStats {
    /// Number of entity types with records
    pub entity_type_count: usize,
    /// Total number of records
    pub total_records: usize,
}
