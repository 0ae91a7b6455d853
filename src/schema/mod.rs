//! Entity schemas: the statically declared metadata that drives population,
//! validation and serialization.
//!
//! # Key Types
//!
//! - [`EntitySchema`] - identifier, scalar fields and associations of one type
//! - [`EntityHandler`] - a schema plus its field-setter table
//! - [`SchemaRegistry`] - entity type name → handler
//!
//! # Examples
//!
//! ```rust
//! use entity_configurator::schema::{
//!     AssociationDefinition, Constraint, EntitySchema, FieldDefinition, FieldType,
//!     SchemaRegistry,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let user = EntitySchema::builder("User")
//!     .identifier(["id"])
//!     .field(FieldDefinition::new("id", FieldType::Integer).groups(["public"]))
//!     .field(
//!         FieldDefinition::new("email", FieldType::String)
//!             .groups(["public"])
//!             .constraint(Constraint::not_blank()),
//!     )
//!     .association(AssociationDefinition::one("address", "Address"))
//!     .build()?;
//!
//! let address = EntitySchema::builder("Address")
//!     .identifier(["id"])
//!     .field(FieldDefinition::new("id", FieldType::Integer))
//!     .field(FieldDefinition::new("zip", FieldType::String).constraint(Constraint::digits(5)))
//!     .build()?;
//!
//! let registry = SchemaRegistry::new().with_schema(user)?.with_schema(address)?;
//! registry.check_references()?;
//! # Ok(())
//! # }
//! ```

pub mod handlers;
pub mod registry;
pub mod types;


pub use handlers::{EntityHandler, EntityHandlerBuilder, FieldSetter};
pub use registry::SchemaRegistry;
pub use types::{
    AssociationDefinition, Cardinality, Constraint, EntitySchema, EntitySchemaBuilder,
    FieldDefinition, FieldType, IdStrategy, Rule,
};
