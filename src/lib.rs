//! Schema-driven entity configuration for Rust.
//!
//! Maps untyped JSON payloads onto entity graphs, validates them against
//! declared constraints, persists them through a unit of work and renders
//! them back to JSON with group-based field selection.
//!
//! # Core Components
//!
//! - [`EntityConfigurator`] - recursive fill, `save` and `create`
//! - [`SchemaRegistry`] - entity schemas and field-setter tables
//! - [`EntityContext`] - relation mapping and behavior flags
//! - [`Serializer`] - group-filtered entity → JSON conversion
//! - [`ApiController`] - request body → response adapter
//! - [`storage::EntityStore`] - pluggable async record store
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use entity_configurator::{EntityConfigurator, EntityContext, SchemaRegistry, Serializer};
//! use entity_configurator::storage::InMemoryStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(SchemaRegistry::from_schema_dir("schemas")?);
//! let context = EntityContext::builder().throw_on_error(true).build();
//! let mut configurator =
//!     EntityConfigurator::new(InMemoryStore::new(), registry.clone()).with_context(context);
//!
//! configurator
//!     .create(&json!({"email": "a@b.com", "address": {"zip": "12345"}}), "User")
//!     .await?;
//!
//! let root = configurator.entity().expect("root entity");
//! let body = Serializer::new(registry).to_array(configurator.unit_of_work(), root, &["public"])?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod configurator;
pub mod context;
pub mod entity;
pub mod error;
pub mod error_tree;
pub mod manager;
pub mod schema;
pub mod serializer;
pub mod storage;
pub mod validation;

// Re-export commonly used types for convenience
pub use api::{ApiController, ApiResponse, CorsConfig, RequestBody};
pub use configurator::{EntityConfigurator, FillMode};
pub use context::{EntityContext, EntityContextBuilder, RelationMap};
pub use entity::{Entity, EntityHandle, Identifier, UnitOfWork};
pub use error::{ConfiguratorError, ConfiguratorResult, SchemaError, SchemaResult};
pub use error_tree::{ErrorNode, ErrorTree};
pub use manager::EntityManager;
pub use schema::{EntityHandler, EntitySchema, SchemaRegistry};
pub use serializer::{Serializer, Subject};
pub use validation::{SchemaValidator, Validator, Violation};
