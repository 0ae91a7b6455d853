//! The in-memory entity record.
//!
//! Scalar values (identifier fields included) live in a JSON field map.
//! Associations are [`Link`]s holding [`EntityRef`]s: either a handle to an
//! entity already in the unit of work, or an identifier reference read from
//! storage that has not been loaded yet.

use super::identifier::Identifier;
use super::version::EntityVersion;
use crate::schema::{Cardinality, EntitySchema};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Position of an entity inside a [`UnitOfWork`](super::UnitOfWork).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub(crate) usize);

impl EntityHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Instantiated in this unit of work, never stored
    New,
    /// Loaded from or written to the store
    Managed,
}

/// Target of an association link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Managed(EntityHandle),
    Reference {
        entity_type: String,
        id: Identifier,
    },
}

/// Value of one association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    One(Option<EntityRef>),
    Many(Vec<EntityRef>),
}

impl Link {
    pub fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::One => Self::One(None),
            Cardinality::Many => Self::Many(Vec::new()),
        }
    }

    pub fn refs(&self) -> Vec<&EntityRef> {
        match self {
            Self::One(target) => target.iter().collect(),
            Self::Many(members) => members.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(target) => usize::from(target.is_some()),
            Self::Many(members) => members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A mutable entity record.
#[derive(Debug, Clone)]
pub struct Entity {
    entity_type: String,
    fields: Map<String, Value>,
    links: BTreeMap<String, Link>,
    state: EntityState,
    version: Option<EntityVersion>,
}

impl Entity {
    /// Empty new entity without association slots.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: Map::new(),
            links: BTreeMap::new(),
            state: EntityState::New,
            version: None,
        }
    }

    /// Empty new entity with every declared association unlinked.
    pub fn from_schema(schema: &EntitySchema) -> Self {
        let mut entity = Self::new(schema.name.clone());
        for association in &schema.associations {
            entity
                .links
                .insert(association.name.clone(), Link::empty(association.cardinality));
        }
        entity
    }

    pub(crate) fn managed(
        entity_type: String,
        fields: Map<String, Value>,
        links: BTreeMap<String, Link>,
        version: EntityVersion,
    ) -> Self {
        Self {
            entity_type,
            fields,
            links,
            state: EntityState::Managed,
            version: Some(version),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state == EntityState::New
    }

    /// Version this entity was loaded or last written with.
    pub fn version(&self) -> Option<&EntityVersion> {
        self.version.as_ref()
    }

    pub(crate) fn mark_managed(&mut self, version: EntityVersion) {
        self.state = EntityState::Managed;
        self.version = Some(version);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    pub fn link(&self, association: &str) -> Option<&Link> {
        self.links.get(association)
    }

    pub fn links(&self) -> &BTreeMap<String, Link> {
        &self.links
    }

    /// Replace the link stored under `association`.
    pub fn set_link(&mut self, association: impl Into<String>, link: Link) {
        self.links.insert(association.into(), link);
    }

    pub(crate) fn link_mut(&mut self, association: &str, cardinality: Cardinality) -> &mut Link {
        self.links
            .entry(association.to_string())
            .or_insert_with(|| Link::empty(cardinality))
    }

    /// Identifier built from the field map, if every identifier field is set.
    pub fn identifier(&self, schema: &EntitySchema) -> Option<Identifier> {
        Identifier::extract(&schema.identifier, &self.fields)
    }

    pub(crate) fn set_identifier(&mut self, schema: &EntitySchema, id: &Identifier) {
        for (field, value) in schema.identifier.iter().zip(id.values()) {
            self.fields.insert(field.clone(), value.clone());
        }
    }
}
