//! Error types for entity configuration operations.
//!
//! Validation failures are data: they are collected into an [`ErrorTree`] and
//! only turned into [`ConfiguratorError::ValidationFailed`] when the entity
//! context asks for it. Everything else here aborts the current operation.

use crate::error_tree::ErrorTree;

/// Main error type for populating, persisting and serializing entities.
#[derive(Debug, thiserror::Error)]
pub enum ConfiguratorError {
    /// Payload is structurally unusable (missing identifier in strict mode,
    /// wrong shape for a relation, non-object root, ...)
    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    /// Aggregated constraint violations, raised only when the entity context
    /// is configured to throw on error
    #[error("Validation failed: {0}")]
    ValidationFailed(ErrorTree),

    /// No schema registered for the requested entity type
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Load by identifier found nothing
    #[error("Entity not found: {entity_type} with identifier {id}")]
    EntityNotFound { entity_type: String, id: String },

    /// Identifier could not be produced for an entity about to be persisted
    #[error("Entity '{entity_type}' has no value for identifier field '{field}'")]
    MissingIdentifier { entity_type: String, field: String },

    /// Nested payload is deeper than the configured limit
    #[error("Payload nesting exceeds the maximum depth of {max_depth}")]
    DepthLimitExceeded { max_depth: usize },

    /// A registered field setter rejected a value
    #[error("Setter for '{entity_type}.{field}' failed: {message}")]
    Setter {
        entity_type: String,
        field: String,
        message: String,
    },

    /// Schema declaration or loading problem
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Errors from the entity store
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Broken internal invariant (stale handle and the like)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised while declaring, loading or registering entity schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Schema declares no identifier fields
    #[error("Schema '{entity_type}' declares no identifier fields")]
    MissingIdentifier { entity_type: String },

    /// Identifier names a field the schema does not declare
    #[error("Schema '{entity_type}' uses undeclared field '{field}' as identifier")]
    UndeclaredIdentifier { entity_type: String, field: String },

    /// Two fields or associations share a name
    #[error("Schema '{entity_type}' declares '{name}' more than once")]
    DuplicateName { entity_type: String, name: String },

    /// Setter registered for a field the schema does not declare
    #[error("Schema '{entity_type}' has no field '{field}' to attach a setter to")]
    UnknownField { entity_type: String, field: String },

    /// Association targets a type missing from the registry
    #[error("Association '{entity_type}.{association}' targets unregistered type '{target}'")]
    UnknownTarget {
        entity_type: String,
        association: String,
        target: String,
    },

    /// Schema file could not be read
    #[error("Failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Schema document is not valid JSON for a schema
    #[error("Failed to parse schema: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfiguratorError {
    /// Create an invalid payload error
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Create an entity not found error
    pub fn entity_not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::EntityNotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wrap a storage error
    pub fn storage<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(error))
    }

    /// The error tree carried by a validation failure, if this is one.
    pub fn error_tree(&self) -> Option<&ErrorTree> {
        match self {
            Self::ValidationFailed(tree) => Some(tree),
            _ => None,
        }
    }
}

pub type ConfiguratorResult<T> = Result<T, ConfiguratorError>;
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = ConfiguratorError::entity_not_found("User", 5);
        assert!(error.to_string().contains("User"));
        assert!(error.to_string().contains('5'));
    }

    #[test]
    fn test_validation_failed_carries_tree() {
        let mut tree = ErrorTree::new();
        tree.insert_message("email", "must not be blank");
        let error = ConfiguratorError::ValidationFailed(tree.clone());

        assert_eq!(error.error_tree(), Some(&tree));
        assert!(error.to_string().contains("must not be blank"));
    }

    #[test]
    fn test_error_chain() {
        let schema_error = SchemaError::MissingIdentifier {
            entity_type: "User".to_string(),
        };
        let error = ConfiguratorError::from(schema_error);
        assert!(error.to_string().starts_with("Schema error"));
    }
}
