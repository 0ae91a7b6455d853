//! Test fixtures: the schema registry loaded from `tests/fixtures/schemas`
//! and sample payloads.

use entity_configurator::SchemaRegistry;
use entity_configurator::schema::EntityHandler;
use serde_json::{Value, json};
use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();

/// Fixture registry. The User handler normalizes `name` through a setter.
pub fn registry() -> Arc<SchemaRegistry> {
    REGISTRY
        .get_or_init(|| {
            let mut registry = SchemaRegistry::from_schema_dir("tests/fixtures/schemas")
                .expect("Failed to load fixture schemas");
            let user = registry.schema("User").unwrap().clone();
            let handler = EntityHandler::builder(user)
                .with_setter("name", |fields, value| match value {
                    Value::String(name) => {
                        fields.insert("name".to_string(), Value::String(name.trim().to_string()));
                        Ok(())
                    }
                    Value::Null => {
                        fields.insert("name".to_string(), Value::Null);
                        Ok(())
                    }
                    other => Err(format!("expected a string, got {other}")),
                })
                .build()
                .expect("Failed to build User handler");
            registry.register_handler(handler);
            Arc::new(registry)
        })
        .clone()
}

/// A valid user with a nested address.
pub fn user_payload() -> Value {
    json!({
        "email": "jane@example.com",
        "name": "Jane",
        "password": "secret",
        "address": {"zip": "12345", "city": "Springfield"}
    })
}

/// The invalid payload from the documentation: blank email, bad zip.
pub fn invalid_user_payload() -> Value {
    json!({
        "email": null,
        "address": {"zip": "bad"}
    })
}
