//! Registry of entity handlers, the metadata provider for population,
//! validation and serialization.
//!
//! Schemas are registered in code or loaded from JSON documents: a single
//! schema object, an array of schema objects, or a directory of `*.json`
//! files holding either.

use super::handlers::EntityHandler;
use super::types::EntitySchema;
use crate::error::{ConfiguratorError, ConfiguratorResult, SchemaError, SchemaResult};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Entity type name → handler.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    handlers: HashMap<String, Arc<EntityHandler>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaDocument {
    Many(Vec<EntitySchema>),
    One(EntitySchema),
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema with direct field assignment.
    pub fn register(&mut self, schema: EntitySchema) -> SchemaResult<()> {
        self.register_handler(EntityHandler::new(schema)?);
        Ok(())
    }

    /// Register a handler, replacing any handler for the same type.
    pub fn register_handler(&mut self, handler: EntityHandler) {
        debug!("Registering entity type '{}'", handler.entity_type());
        self.handlers
            .insert(handler.entity_type().to_string(), Arc::new(handler));
    }

    /// Builder-style registration.
    pub fn with_schema(mut self, schema: EntitySchema) -> SchemaResult<Self> {
        self.register(schema)?;
        Ok(self)
    }

    /// Builder-style handler registration.
    pub fn with_handler(mut self, handler: EntityHandler) -> Self {
        self.register_handler(handler);
        self
    }

    /// Load schemas from a JSON string.
    pub fn from_json_str(content: &str) -> SchemaResult<Self> {
        let mut registry = Self::new();
        registry.load_json_str(content)?;
        registry.check_references()?;
        Ok(registry)
    }

    /// Create a registry by loading every `*.json` file in a directory.
    pub fn from_schema_dir<P: AsRef<Path>>(schema_dir: P) -> SchemaResult<Self> {
        let dir = schema_dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| SchemaError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SchemaError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            registry.load_schema_file(&path)?;
        }
        registry.check_references()?;
        Ok(registry)
    }

    /// Load a schema file into this registry.
    pub fn load_schema_file<P: AsRef<Path>>(&mut self, path: P) -> SchemaResult<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.load_json_str(&content)
    }

    fn load_json_str(&mut self, content: &str) -> SchemaResult<()> {
        let schemas = match serde_json::from_str::<SchemaDocument>(content) {
            Ok(SchemaDocument::Many(schemas)) => schemas,
            Ok(SchemaDocument::One(schema)) => vec![schema],
            // Re-parse as a single schema to surface a precise error
            Err(_) => vec![serde_json::from_str::<EntitySchema>(content)?],
        };
        for schema in schemas {
            self.register(schema)?;
        }
        Ok(())
    }

    /// Every association must target a registered type.
    pub fn check_references(&self) -> SchemaResult<()> {
        for handler in self.handlers.values() {
            for association in &handler.schema.associations {
                if !self.handlers.contains_key(&association.target) {
                    return Err(SchemaError::UnknownTarget {
                        entity_type: handler.schema.name.clone(),
                        association: association.name.clone(),
                        target: association.target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Handler for an entity type.
    pub fn handler(&self, entity_type: &str) -> ConfiguratorResult<&Arc<EntityHandler>> {
        self.handlers
            .get(entity_type)
            .ok_or_else(|| ConfiguratorError::UnknownEntityType(entity_type.to_string()))
    }

    /// Schema for an entity type.
    pub fn schema(&self, entity_type: &str) -> ConfiguratorResult<&EntitySchema> {
        self.handler(entity_type).map(|handler| &handler.schema)
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.handlers.contains_key(entity_type)
    }

    /// Registered entity type names, sorted.
    pub fn entity_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
