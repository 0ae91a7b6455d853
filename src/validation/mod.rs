//! Constraint validation of populated entities.
//!
//! The configurator talks to validation through the [`Validator`] trait, so
//! hosts can plug in their own rule engine. [`SchemaValidator`] checks the
//! constraints declared on the entity schema.

pub mod constraints;

pub use constraints::SchemaValidator;

use crate::entity::Entity;
use crate::schema::EntitySchema;
use std::collections::BTreeMap;

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field or association the violation belongs to
    pub property_path: String,
    pub message: String,
}

impl Violation {
    pub fn new(property_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            message: message.into(),
        }
    }
}

/// Validates a populated entity against its declared constraints.
pub trait Validator: Send + Sync {
    fn validate(&self, entity: &Entity, schema: &EntitySchema) -> Vec<Violation>;
}

/// Collapse violations into path → message. When a path repeats, the last
/// message wins.
pub fn flatten(violations: Vec<Violation>) -> BTreeMap<String, String> {
    violations
        .into_iter()
        .map(|violation| (violation.property_path, violation.message))
        .collect()
}
