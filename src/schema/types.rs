//! Core schema type definitions for entity types.
//!
//! An [`EntitySchema`] is the static descriptor of one entity type: which
//! fields form its identifier, how identifiers are generated, its scalar
//! fields and its associations to other entity types. Schemas can be built
//! in code or deserialized from JSON documents.

use crate::error::{SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Descriptor of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    /// Entity type name, used as lookup key
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Identifier field names, in declaration order
    pub identifier: Vec<String>,
    /// How identifiers are produced for new entities
    #[serde(default)]
    pub id_strategy: IdStrategy,
    /// Scalar field definitions, identifier fields included
    pub fields: Vec<FieldDefinition>,
    /// Association definitions
    #[serde(default)]
    pub associations: Vec<AssociationDefinition>,
}

/// Identifier generation strategy for new entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdStrategy {
    /// Per-type integer sequence supplied by the store
    #[default]
    Auto,
    /// Random UUID v4 string
    Uuid,
    /// Identifier values come from the payload
    Assigned,
}

/// Definition of a scalar field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: FieldType,
    /// Serializer groups this field belongs to
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// Scalar value types checked by the schema validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    String,
    Integer,
    Decimal,
    Boolean,
    /// RFC 3339 timestamp string
    DateTime,
    /// Hyphenated UUID string
    Uuid,
    /// Any JSON value
    #[default]
    Json,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Uuid => "uuid",
            Self::Json => "json",
        }
    }
}

/// Definition of an association to another entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationDefinition {
    pub name: String,
    /// Target entity type name
    pub target: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// Whether an association links a single entity or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    One,
    Many,
}

/// A validation rule with an optional message override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub rule: Rule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Validation rules understood by the schema validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rule {
    /// Value must not be null (to-one associations: must be linked)
    NotNull,
    /// Value must not be null, an empty/whitespace string or an empty array
    NotBlank,
    /// Character count of a string or length of an array
    Length {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// Numeric bounds, inclusive
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Value must be one of the listed strings
    Choice { choices: Vec<String> },
    /// Loose e-mail address shape check
    Email,
    /// String of exactly `exact` ASCII digits
    Digits { exact: usize },
    /// Member count of a to-many association
    Count {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
}

impl Constraint {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            message: None,
        }
    }

    pub fn not_null() -> Self {
        Self::new(Rule::NotNull)
    }

    pub fn not_blank() -> Self {
        Self::new(Rule::NotBlank)
    }

    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Self::new(Rule::Length { min, max })
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(Rule::Range { min, max })
    }

    pub fn choice<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Rule::Choice {
            choices: choices.into_iter().map(Into::into).collect(),
        })
    }

    pub fn email() -> Self {
        Self::new(Rule::Email)
    }

    pub fn digits(exact: usize) -> Self {
        Self::new(Rule::Digits { exact })
    }

    pub fn count(min: Option<usize>, max: Option<usize>) -> Self {
        Self::new(Rule::Count { min, max })
    }

    /// Replace the default message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            name: name.into(),
            data_type,
            groups: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn in_any_group(&self, groups: &HashSet<&str>) -> bool {
        self.groups.iter().any(|g| groups.contains(g.as_str()))
    }
}

impl AssociationDefinition {
    pub fn new(name: impl Into<String>, target: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality,
            groups: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Cardinality::One)
    }

    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Cardinality::Many)
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn in_any_group(&self, groups: &HashSet<&str>) -> bool {
        self.groups.iter().any(|g| groups.contains(g.as_str()))
    }
}

impl EntitySchema {
    /// Start declaring a schema in code.
    pub fn builder(name: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            schema: EntitySchema {
                name: name.into(),
                description: String::new(),
                identifier: Vec::new(),
                id_strategy: IdStrategy::Auto,
                fields: Vec::new(),
                associations: Vec::new(),
            },
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationDefinition> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        self.identifier.iter().any(|id| id == name)
    }

    /// Declared fields that are not part of the identifier.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !self.is_identifier(&f.name))
    }

    /// Check the schema is internally consistent.
    pub fn check(&self) -> SchemaResult<()> {
        if self.identifier.is_empty() {
            return Err(SchemaError::MissingIdentifier {
                entity_type: self.name.clone(),
            });
        }

        let mut seen = HashSet::new();
        let names = self
            .fields
            .iter()
            .map(|f| &f.name)
            .chain(self.associations.iter().map(|a| &a.name));
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateName {
                    entity_type: self.name.clone(),
                    name: name.clone(),
                });
            }
        }

        for id in &self.identifier {
            if self.field(id).is_none() {
                return Err(SchemaError::UndeclaredIdentifier {
                    entity_type: self.name.clone(),
                    field: id.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Builder for [`EntitySchema`].
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    schema: EntitySchema,
}

impl EntitySchemaBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.schema.description = description.into();
        self
    }

    pub fn identifier<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.identifier = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.schema.id_strategy = strategy;
        self
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.schema.fields.push(field);
        self
    }

    pub fn association(mut self, association: AssociationDefinition) -> Self {
        self.schema.associations.push(association);
        self
    }

    pub fn build(self) -> SchemaResult<EntitySchema> {
        self.schema.check()?;
        Ok(self.schema)
    }
}
