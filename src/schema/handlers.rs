//! Per-type handlers: a schema plus its field-setter table.
//!
//! Field assignment during population goes through the setter table built
//! at registration time. Fields without a registered setter are assigned
//! directly, with no side effects.

use crate::entity::Entity;
use crate::error::{ConfiguratorError, ConfiguratorResult, SchemaError, SchemaResult};
use crate::schema::EntitySchema;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Assignment function for one field. Receives the entity's field map and
/// the payload value; an `Err` message rejects the value.
pub type FieldSetter = Arc<dyn Fn(&mut Map<String, Value>, Value) -> Result<(), String> + Send + Sync>;

/// Handler for a specific entity type containing its schema and setters
#[derive(Clone)]
pub struct EntityHandler {
    pub schema: EntitySchema,
    setters: HashMap<String, FieldSetter>,
}

impl std::fmt::Debug for EntityHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut setters: Vec<_> = self.setters.keys().collect();
        setters.sort();
        f.debug_struct("EntityHandler")
            .field("schema", &self.schema)
            .field("setters", &setters)
            .finish()
    }
}

impl EntityHandler {
    /// Handler with direct assignment for every field.
    pub fn new(schema: EntitySchema) -> SchemaResult<Self> {
        EntityHandlerBuilder::new(schema).build()
    }

    pub fn builder(schema: EntitySchema) -> EntityHandlerBuilder {
        EntityHandlerBuilder::new(schema)
    }

    pub fn entity_type(&self) -> &str {
        &self.schema.name
    }

    /// Whether `field` is assigned through a registered setter.
    pub fn has_setter(&self, field: &str) -> bool {
        self.setters.contains_key(field)
    }

    /// Assign a payload value to a declared field of `entity`.
    pub fn assign(&self, entity: &mut Entity, field: &str, value: Value) -> ConfiguratorResult<()> {
        match self.setters.get(field) {
            Some(setter) => setter(entity.fields_mut(), value).map_err(|message| {
                ConfiguratorError::Setter {
                    entity_type: self.schema.name.clone(),
                    field: field.to_string(),
                    message,
                }
            }),
            None => {
                entity.fields_mut().insert(field.to_string(), value);
                Ok(())
            }
        }
    }
}

/// Builder for creating entity handlers
pub struct EntityHandlerBuilder {
    schema: EntitySchema,
    setters: HashMap<String, FieldSetter>,
}

impl EntityHandlerBuilder {
    pub fn new(schema: EntitySchema) -> Self {
        Self {
            schema,
            setters: HashMap::new(),
        }
    }

    pub fn with_setter<F>(mut self, field: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&mut Map<String, Value>, Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.setters.insert(field.into(), Arc::new(setter));
        self
    }

    pub fn build(self) -> SchemaResult<EntityHandler> {
        self.schema.check()?;
        if let Some(field) = self
            .setters
            .keys()
            .find(|name| self.schema.field(name).is_none())
        {
            return Err(SchemaError::UnknownField {
                entity_type: self.schema.name.clone(),
                field: field.clone(),
            });
        }
        Ok(EntityHandler {
            schema: self.schema,
            setters: self.setters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldType};
    use serde_json::json;

    fn user_schema() -> EntitySchema {
        EntitySchema::builder("User")
            .identifier(["id"])
            .field(FieldDefinition::new("id", FieldType::Integer))
            .field(FieldDefinition::new("email", FieldType::String))
            .build()
            .unwrap()
    }

    #[test]
    fn test_direct_assignment_without_setter() {
        let handler = EntityHandler::new(user_schema()).unwrap();
        let mut entity = Entity::new("User");
        handler.assign(&mut entity, "email", json!("a@b.com")).unwrap();
        assert_eq!(entity.get("email"), Some(&json!("a@b.com")));
    }

    #[test]
    fn test_registered_setter_is_invoked() {
        let handler = EntityHandler::builder(user_schema())
            .with_setter("email", |fields, value| {
                let email = value.as_str().ok_or("email must be a string")?;
                fields.insert("email".to_string(), json!(email.to_lowercase()));
                Ok(())
            })
            .build()
            .unwrap();
        assert!(handler.has_setter("email"));
        assert!(!handler.has_setter("id"));

        let mut entity = Entity::new("User");
        handler.assign(&mut entity, "email", json!("A@B.COM")).unwrap();
        assert_eq!(entity.get("email"), Some(&json!("a@b.com")));

        let err = handler.assign(&mut entity, "email", json!(5)).unwrap_err();
        assert!(matches!(err, ConfiguratorError::Setter { .. }));
    }

    #[test]
    fn test_setter_for_unknown_field_is_rejected() {
        let result = EntityHandler::builder(user_schema())
            .with_setter("nickname", |_, _| Ok(()))
            .build();
        assert!(matches!(result, Err(SchemaError::UnknownField { .. })));
    }
}
