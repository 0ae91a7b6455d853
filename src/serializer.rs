//! Group-filtered conversion of entities into plain JSON.
//!
//! A field or association is emitted when it is tagged with at least one of
//! the requested groups. Emitted fields without a value are rendered as
//! `null`, never omitted. Linked entities are rendered recursively with the
//! same groups. A link that cannot be expanded (target not loaded in the unit
//! of work, or already being rendered further up) becomes an identifier
//! object such as `{"id": 3}`.
//!
//! ```rust
//! use entity_configurator::entity::{Entity, UnitOfWork};
//! use entity_configurator::schema::{EntitySchema, FieldDefinition, FieldType, SchemaRegistry};
//! use entity_configurator::Serializer;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = EntitySchema::builder("User")
//!     .identifier(["id"])
//!     .field(FieldDefinition::new("id", FieldType::Integer).groups(["test"]))
//!     .field(FieldDefinition::new("email", FieldType::String).groups(["test"]))
//!     .field(FieldDefinition::new("password", FieldType::String).groups(["private"]))
//!     .build()?;
//! let registry = Arc::new(SchemaRegistry::new().with_schema(schema.clone())?);
//!
//! let mut unit_of_work = UnitOfWork::new();
//! let mut user = Entity::from_schema(&schema);
//! user.fields_mut().insert("email".into(), json!("a@b.com"));
//! user.fields_mut().insert("password".into(), json!("secret"));
//! let handle = unit_of_work.insert(user, None);
//!
//! let value = Serializer::new(registry).to_array(&unit_of_work, handle, &["test"])?;
//! assert_eq!(value, json!({"id": null, "email": "a@b.com"}));
//! # Ok(())
//! # }
//! ```

use crate::entity::{Entity, EntityHandle, EntityRef, Link, UnitOfWork};
use crate::error::ConfiguratorResult;
use crate::schema::{Cardinality, EntitySchema, SchemaRegistry};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// What to serialize.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Entity(EntityHandle),
    Collection(&'a [EntityHandle]),
}

impl From<EntityHandle> for Subject<'_> {
    fn from(handle: EntityHandle) -> Self {
        Self::Entity(handle)
    }
}

impl<'a> From<&'a [EntityHandle]> for Subject<'a> {
    fn from(handles: &'a [EntityHandle]) -> Self {
        Self::Collection(handles)
    }
}

impl<'a> From<&'a Vec<EntityHandle>> for Subject<'a> {
    fn from(handles: &'a Vec<EntityHandle>) -> Self {
        Self::Collection(handles)
    }
}

/// Serializes entities of a unit of work using their schemas.
#[derive(Debug, Clone)]
pub struct Serializer {
    registry: Arc<SchemaRegistry>,
}

impl Serializer {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Render an entity as an object, or a collection as an array of
    /// objects. An empty `groups` slice selects nothing.
    pub fn to_array<'a>(
        &self,
        unit_of_work: &UnitOfWork,
        subject: impl Into<Subject<'a>>,
        groups: &[&str],
    ) -> ConfiguratorResult<Value> {
        let groups: HashSet<&str> = groups.iter().copied().collect();
        let mut path = Vec::new();
        match subject.into() {
            Subject::Entity(handle) => self.render(unit_of_work, handle, &groups, &mut path),
            Subject::Collection(handles) => handles
                .iter()
                .map(|&handle| self.render(unit_of_work, handle, &groups, &mut path))
                .collect::<ConfiguratorResult<Vec<_>>>()
                .map(Value::Array),
        }
    }

    /// [`to_array`](Self::to_array) encoded as a JSON string.
    pub fn to_json_string<'a>(
        &self,
        unit_of_work: &UnitOfWork,
        subject: impl Into<Subject<'a>>,
        groups: &[&str],
    ) -> ConfiguratorResult<String> {
        let value = self.to_array(unit_of_work, subject, groups)?;
        Ok(serde_json::to_string(&value)?)
    }

    fn render(
        &self,
        unit_of_work: &UnitOfWork,
        handle: EntityHandle,
        groups: &HashSet<&str>,
        path: &mut Vec<EntityHandle>,
    ) -> ConfiguratorResult<Value> {
        let entity = unit_of_work.entity(handle)?;
        let schema = self.registry.schema(entity.entity_type())?;
        path.push(handle);

        let mut out = Map::new();
        for field in schema.fields.iter().filter(|f| f.in_any_group(groups)) {
            let value = entity.get(&field.name).cloned().unwrap_or(Value::Null);
            out.insert(field.name.clone(), value);
        }

        for association in schema.associations.iter().filter(|a| a.in_any_group(groups)) {
            let value = match entity.link(&association.name) {
                Some(Link::One(Some(reference))) => {
                    self.render_ref(unit_of_work, reference, groups, path)?
                }
                Some(Link::Many(members)) => Value::Array(
                    members
                        .iter()
                        .map(|reference| self.render_ref(unit_of_work, reference, groups, path))
                        .collect::<ConfiguratorResult<_>>()?,
                ),
                None if association.cardinality == Cardinality::Many => Value::Array(Vec::new()),
                _ => Value::Null,
            };
            out.insert(association.name.clone(), value);
        }

        path.pop();
        Ok(Value::Object(out))
    }

    fn render_ref(
        &self,
        unit_of_work: &UnitOfWork,
        reference: &EntityRef,
        groups: &HashSet<&str>,
        path: &mut Vec<EntityHandle>,
    ) -> ConfiguratorResult<Value> {
        let handle = match reference {
            EntityRef::Managed(handle) => *handle,
            EntityRef::Reference { entity_type, id } => match unit_of_work.find(entity_type, id) {
                Some(handle) => handle,
                None => {
                    let schema = self.registry.schema(entity_type)?;
                    return Ok(Value::Object(id.to_map(&schema.identifier)));
                }
            },
        };

        if path.contains(&handle) {
            let entity = unit_of_work.entity(handle)?;
            let schema = self.registry.schema(entity.entity_type())?;
            return Ok(identifier_object(entity, schema));
        }
        self.render(unit_of_work, handle, groups, path)
    }
}

fn identifier_object(entity: &Entity, schema: &EntitySchema) -> Value {
    Value::Object(
        schema
            .identifier
            .iter()
            .map(|field| {
                let value = entity.get(field).cloned().unwrap_or(Value::Null);
                (field.clone(), value)
            })
            .collect(),
    )
}
