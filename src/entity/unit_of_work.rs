//! Arena of the entities touched by one request.
//!
//! Entities are addressed by [`EntityHandle`]. The identity map guarantees a
//! stored record is materialized at most once per unit of work, so every
//! link to the same `(type, identifier)` points at the same entity.

use super::entity::{Entity, EntityHandle, EntityRef};
use super::identifier::Identifier;
use crate::error::{ConfiguratorError, ConfiguratorResult};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct UnitOfWork {
    entities: Vec<Entity>,
    identity_map: HashMap<(String, Identifier), EntityHandle>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity; loaded entities should pass their identifier.
    pub fn insert(&mut self, entity: Entity, id: Option<Identifier>) -> EntityHandle {
        let handle = EntityHandle(self.entities.len());
        if let Some(id) = id {
            self.identity_map
                .insert((entity.entity_type().to_string(), id), handle);
        }
        self.entities.push(entity);
        handle
    }

    /// Record the identifier of an entity that just received one.
    pub fn register_identity(&mut self, handle: EntityHandle, id: Identifier) -> ConfiguratorResult<()> {
        let entity_type = self.entity(handle)?.entity_type().to_string();
        self.identity_map.insert((entity_type, id), handle);
        Ok(())
    }

    pub fn find(&self, entity_type: &str, id: &Identifier) -> Option<EntityHandle> {
        self.identity_map
            .get(&(entity_type.to_string(), id.clone()))
            .copied()
    }

    /// Handle for a reference, when its target is in this unit of work.
    pub fn resolve(&self, reference: &EntityRef) -> Option<EntityHandle> {
        match reference {
            EntityRef::Managed(handle) => Some(*handle),
            EntityRef::Reference { entity_type, id } => self.find(entity_type, id),
        }
    }

    /// Whether `reference` designates the entity at `handle`.
    pub fn refers_to(&self, reference: &EntityRef, handle: EntityHandle) -> bool {
        self.resolve(reference) == Some(handle)
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        self.entities.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.entities.get_mut(handle.0)
    }

    pub fn entity(&self, handle: EntityHandle) -> ConfiguratorResult<&Entity> {
        self.get(handle)
            .ok_or_else(|| ConfiguratorError::internal(format!("stale entity handle {handle}")))
    }

    pub fn entity_mut(&mut self, handle: EntityHandle) -> ConfiguratorResult<&mut Entity> {
        self.get_mut(handle)
            .ok_or_else(|| ConfiguratorError::internal(format!("stale entity handle {handle}")))
    }

    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        (0..self.entities.len()).map(EntityHandle)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.identity_map.clear();
    }
}
