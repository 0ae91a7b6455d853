//! Errors raised by entity stores.
//!
//! These describe persistence failures only: missing records, write
//! conflicts and backend faults. Schema and payload problems never reach
//! this layer.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record under the key.
    #[error("Record not found: {entity_type}/{id}")]
    RecordNotFound { entity_type: String, id: String },

    /// An insert hit a record that already exists.
    #[error("Record already exists: {entity_type}/{id}")]
    RecordAlreadyExists { entity_type: String, id: String },

    /// The stored version differs from the one the writer loaded.
    #[error("Concurrent modification of {entity_type}/{id}: expected version {}, found {}",
        .expected_version.as_deref().unwrap_or("<none>"),
        .actual_version.as_deref().unwrap_or("<none>"))]
    ConcurrentModification {
        entity_type: String,
        id: String,
        expected_version: Option<String>,
        actual_version: Option<String>,
    },

    /// Record data could not be encoded or decoded.
    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend fault.
    #[error("Internal storage error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    pub fn record_not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn record_already_exists(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RecordAlreadyExists {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Versions are `None` when the writer expected no record, or found none.
    pub fn concurrent_modification(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        expected_version: Option<String>,
        actual_version: Option<String>,
    ) -> Self {
        Self::ConcurrentModification {
            entity_type: entity_type.into(),
            id: id.into(),
            expected_version,
            actual_version,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }

    /// Duplicate insert or stale version.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::RecordAlreadyExists { .. } | Self::ConcurrentModification { .. }
        )
    }
}
