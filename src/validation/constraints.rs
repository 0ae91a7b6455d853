//! Validation of the constraints declared on entity schemas.
//!
//! Every declared field is checked, whether or not the last payload touched
//! it: a new entity missing a `notBlank` field is invalid. A field whose
//! value has the wrong type reports only the type error.

use super::{Validator, Violation};
use crate::entity::{Entity, Link};
use crate::schema::{
    AssociationDefinition, Cardinality, Constraint, EntitySchema, FieldDefinition, FieldType, Rule,
};
use chrono::DateTime;
use serde_json::Value;

/// Validator for schema-declared constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    fn validate_field(&self, field: &FieldDefinition, value: &Value, violations: &mut Vec<Violation>) {
        if !value.is_null() && !Self::matches_type(field.data_type, value) {
            violations.push(Violation::new(
                &field.name,
                format!("must be of type {}", field.data_type.as_str()),
            ));
            return;
        }

        for constraint in &field.constraints {
            if let Some(message) = Self::check_value(constraint, value) {
                violations.push(Violation::new(&field.name, message));
            }
        }
    }

    fn validate_association(
        &self,
        association: &AssociationDefinition,
        link: Option<&Link>,
        violations: &mut Vec<Violation>,
    ) {
        let count = link.map_or(0, Link::len);
        for constraint in &association.constraints {
            let failed = match (&constraint.rule, association.cardinality) {
                (Rule::NotNull | Rule::NotBlank, Cardinality::One) => count == 0,
                (Rule::NotBlank, Cardinality::Many) => count == 0,
                (Rule::Count { min, max } | Rule::Length { min, max }, _) => {
                    min.is_some_and(|min| count < min) || max.is_some_and(|max| count > max)
                }
                _ => false,
            };
            if failed {
                violations.push(Violation::new(
                    &association.name,
                    Self::message(constraint),
                ));
            }
        }
    }

    fn matches_type(data_type: FieldType, value: &Value) -> bool {
        match data_type {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Decimal => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::DateTime => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
            FieldType::Uuid => value
                .as_str()
                .is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
            FieldType::Json => true,
        }
    }

    /// Message for a failed constraint, `None` when the value passes.
    fn check_value(constraint: &Constraint, value: &Value) -> Option<String> {
        let passed = match &constraint.rule {
            Rule::NotNull => !value.is_null(),
            Rule::NotBlank => match value {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(map) => !map.is_empty(),
                _ => true,
            },
            // Null passes everything except NotNull/NotBlank
            _ if value.is_null() => true,
            Rule::Length { min, max } | Rule::Count { min, max } => {
                let len = match value {
                    Value::String(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    _ => return None,
                };
                !(min.is_some_and(|min| len < min) || max.is_some_and(|max| len > max))
            }
            Rule::Range { min, max } => match value.as_f64() {
                Some(n) => !(min.is_some_and(|min| n < min) || max.is_some_and(|max| n > max)),
                None => false,
            },
            Rule::Choice { choices } => match value {
                Value::String(s) => choices.iter().any(|choice| choice == s),
                other => choices.iter().any(|choice| *choice == other.to_string()),
            },
            Rule::Email => value.as_str().is_some_and(is_email),
            Rule::Digits { exact } => value
                .as_str()
                .is_some_and(|s| s.len() == *exact && s.bytes().all(|b| b.is_ascii_digit())),
        };

        if passed {
            None
        } else {
            Some(Self::message(constraint))
        }
    }

    fn message(constraint: &Constraint) -> String {
        if let Some(message) = &constraint.message {
            return message.clone();
        }
        match &constraint.rule {
            Rule::NotNull => "must not be null".to_string(),
            Rule::NotBlank => "must not be blank".to_string(),
            Rule::Length { min, max } | Rule::Count { min, max } => match (min, max) {
                (Some(min), Some(max)) => format!("length must be between {min} and {max}"),
                (Some(min), None) => format!("length must be at least {min}"),
                (None, Some(max)) => format!("length must be at most {max}"),
                (None, None) => "invalid length".to_string(),
            },
            Rule::Range { min, max } => match (min, max) {
                (Some(min), Some(max)) => format!("must be between {min} and {max}"),
                (Some(min), None) => format!("must be at least {min}"),
                (None, Some(max)) => format!("must be at most {max}"),
                (None, None) => "out of range".to_string(),
            },
            Rule::Choice { choices } => format!("must be one of: {}", choices.join(", ")),
            Rule::Email | Rule::Digits { .. } => "invalid format".to_string(),
        }
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

impl Validator for SchemaValidator {
    fn validate(&self, entity: &Entity, schema: &EntitySchema) -> Vec<Violation> {
        let mut violations = Vec::new();
        for field in &schema.fields {
            let value = entity.get(&field.name).unwrap_or(&Value::Null);
            self.validate_field(field, value, &mut violations);
        }
        for association in &schema.associations {
            self.validate_association(association, entity.link(&association.name), &mut violations);
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityHandle, EntityRef};
    use crate::validation::flatten;
    use serde_json::json;

    fn schema() -> EntitySchema {
        EntitySchema::builder("User")
            .identifier(["id"])
            .field(FieldDefinition::new("id", FieldType::Integer))
            .field(
                FieldDefinition::new("email", FieldType::String)
                    .constraint(Constraint::not_blank())
                    .constraint(Constraint::email()),
            )
            .field(FieldDefinition::new("age", FieldType::Integer).constraint(Constraint::range(Some(0.0), Some(150.0))))
            .field(FieldDefinition::new("role", FieldType::String).constraint(Constraint::choice(["admin", "member"])))
            .field(FieldDefinition::new("zip", FieldType::String).constraint(Constraint::digits(5)))
            .field(FieldDefinition::new("bornAt", FieldType::DateTime))
            .field(
                FieldDefinition::new("nickname", FieldType::String)
                    .constraint(Constraint::length(Some(2), Some(4)).with_message("bad nickname")),
            )
            .association(AssociationDefinition::one("company", "Company").constraint(Constraint::not_null()))
            .association(AssociationDefinition::many("tags", "Tag").constraint(Constraint::count(None, Some(1))))
            .build()
            .unwrap()
    }

    fn entity(fields: Value) -> Entity {
        let schema = schema();
        let mut entity = Entity::from_schema(&schema);
        if let Value::Object(map) = fields {
            entity.fields_mut().extend(map);
        }
        entity.set_link("company", Link::One(Some(EntityRef::Managed(EntityHandle(0)))));
        entity
    }

    fn errors(entity: &Entity) -> std::collections::BTreeMap<String, String> {
        flatten(SchemaValidator::new().validate(entity, &schema()))
    }

    #[test]
    fn test_valid_entity() {
        let entity = entity(json!({
            "email": "a@b.com",
            "age": 30,
            "role": "admin",
            "zip": "12345",
            "bornAt": "1990-01-01T00:00:00Z",
            "nickname": "bob"
        }));
        assert!(errors(&entity).is_empty());
    }

    #[test]
    fn test_missing_email_is_blank() {
        let errors = errors(&entity(json!({})));
        assert_eq!(errors.get("email").map(String::as_str), Some("must not be blank"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_constraint_messages() {
        let errors = errors(&entity(json!({
            "email": "not-an-email",
            "age": 200,
            "role": "owner",
            "zip": "bad",
            "bornAt": "yesterday",
            "nickname": "x"
        })));
        assert_eq!(errors["email"], "invalid format");
        assert_eq!(errors["age"], "must be between 0 and 150");
        assert_eq!(errors["role"], "must be one of: admin, member");
        assert_eq!(errors["zip"], "invalid format");
        assert_eq!(errors["bornAt"], "must be of type datetime");
        assert_eq!(errors["nickname"], "bad nickname");
    }

    #[test]
    fn test_type_mismatch_reports_only_type() {
        let errors = errors(&entity(json!({"email": 5})));
        assert_eq!(errors["email"], "must be of type string");
    }

    #[test]
    fn test_association_constraints() {
        let schema = schema();
        let mut entity = Entity::from_schema(&schema);
        entity.fields_mut().insert("email".to_string(), json!("a@b.com"));
        entity.set_link(
            "tags",
            Link::Many(vec![
                EntityRef::Managed(EntityHandle(1)),
                EntityRef::Managed(EntityHandle(2)),
            ]),
        );

        let errors = flatten(SchemaValidator::new().validate(&entity, &schema));
        assert_eq!(errors["company"], "must not be null");
        assert_eq!(errors["tags"], "length must be at most 1");
    }
}
