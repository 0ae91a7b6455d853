//! Entity manager: the persistence gateway between entities and the store.
//!
//! The manager owns the [`UnitOfWork`] of the current request. Entities are
//! loaded into it by identifier, created in it fresh, scheduled with
//! [`EntityManager::persist`] and written with [`EntityManager::flush`].
//!
//! Records are stored as JSON documents:
//!
//! ```json
//! {
//!   "type": "User",
//!   "id": [1],
//!   "fields": {"id": 1, "email": "a@b.com"},
//!   "links": {"address": {"one": [3]}, "tags": {"many": [[1], [2]]}}
//! }
//! ```
//!
//! The record version is a hash of the serialized document, so a flush only
//! writes entities whose content changed and every update states the version
//! it replaces.

use crate::entity::{
    Entity, EntityHandle, EntityRef, EntityVersion, Identifier, Link, UnitOfWork,
};
use crate::error::{ConfiguratorError, ConfiguratorResult};
use crate::schema::{Cardinality, EntitySchema, IdStrategy, SchemaRegistry};
use crate::storage::{EntityStore, RecordWrite, StorageKey, VersionedRecord};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Serialized form of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(rename = "type")]
    entity_type: String,
    id: Identifier,
    fields: Map<String, Value>,
    #[serde(default)]
    links: BTreeMap<String, StoredLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum StoredLink {
    One(Option<Identifier>),
    Many(Vec<Identifier>),
}

/// Loads, tracks and writes entities for one request at a time.
pub struct EntityManager<S: EntityStore> {
    store: S,
    registry: Arc<SchemaRegistry>,
    unit_of_work: UnitOfWork,
    scheduled: Vec<EntityHandle>,
}

impl<S: EntityStore> EntityManager<S> {
    pub fn new(store: S, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            store,
            registry,
            unit_of_work: UnitOfWork::new(),
            scheduled: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.unit_of_work
    }

    pub fn unit_of_work_mut(&mut self) -> &mut UnitOfWork {
        &mut self.unit_of_work
    }

    /// Forget every tracked entity and pending persist.
    pub fn clear(&mut self) {
        self.unit_of_work.clear();
        self.scheduled.clear();
    }

    /// Look an entity up by identifier: identity map first, then the store.
    pub async fn find(
        &mut self,
        entity_type: &str,
        id: &Identifier,
    ) -> ConfiguratorResult<Option<EntityHandle>> {
        if let Some(handle) = self.unit_of_work.find(entity_type, id) {
            return Ok(Some(handle));
        }

        let schema = self.registry.schema(entity_type)?;
        let key = StorageKey::new(entity_type, id.key());
        let Some(record) = self
            .store
            .get(&key)
            .await
            .map_err(ConfiguratorError::storage)?
        else {
            return Ok(None);
        };

        trace!("Loaded {key} at version {}", record.version);
        let entity = decode(schema, record)?;
        Ok(Some(self.unit_of_work.insert(entity, Some(id.clone()))))
    }

    /// Like [`find`](Self::find), but a miss is `EntityNotFound`.
    pub async fn load(&mut self, entity_type: &str, id: &Identifier) -> ConfiguratorResult<EntityHandle> {
        self.find(entity_type, id)
            .await?
            .ok_or_else(|| ConfiguratorError::entity_not_found(entity_type, id))
    }

    /// Load a page of stored entities of one type in identifier order, see
    /// [`StorageKey::compare_ids`].
    pub async fn find_all(
        &mut self,
        entity_type: &str,
        offset: usize,
        limit: usize,
    ) -> ConfiguratorResult<Vec<EntityHandle>> {
        let schema = self.registry.schema(entity_type)?;
        let records = self
            .store
            .list(entity_type, offset, limit)
            .await
            .map_err(ConfiguratorError::storage)?;

        let mut handles = Vec::with_capacity(records.len());
        for (_, record) in records {
            let entity = decode(schema, record)?;
            let id = entity
                .identifier(schema)
                .ok_or_else(|| ConfiguratorError::internal("stored record without identifier"))?;
            let handle = match self.unit_of_work.find(entity_type, &id) {
                Some(handle) => handle,
                None => self.unit_of_work.insert(entity, Some(id)),
            };
            handles.push(handle);
        }
        Ok(handles)
    }

    /// Instantiate a new, empty entity of `entity_type`.
    pub fn create(&mut self, entity_type: &str) -> ConfiguratorResult<EntityHandle> {
        let schema = self.registry.schema(entity_type)?;
        Ok(self.unit_of_work.insert(Entity::from_schema(schema), None))
    }

    /// Handle for a link target, loading it when it is only a reference.
    pub async fn resolve(&mut self, reference: &EntityRef) -> ConfiguratorResult<EntityHandle> {
        match reference {
            EntityRef::Managed(handle) => Ok(*handle),
            EntityRef::Reference { entity_type, id } => self.load(entity_type, id).await,
        }
    }

    /// Schedule `handle` and everything reachable from it for the next flush.
    pub fn persist(&mut self, handle: EntityHandle) -> ConfiguratorResult<()> {
        self.unit_of_work.entity(handle)?;
        if !self.scheduled.contains(&handle) {
            self.scheduled.push(handle);
        }
        Ok(())
    }

    /// Write every scheduled entity, and the entities reachable from them,
    /// in one atomic commit.
    ///
    /// New entities receive identifiers first. Unchanged managed entities are
    /// not written. On a version conflict nothing is written and the store's
    /// error is returned.
    pub async fn flush(&mut self) -> ConfiguratorResult<()> {
        let reachable = self.reachable()?;
        if reachable.is_empty() {
            return Ok(());
        }

        for &handle in &reachable {
            self.assign_identifier(handle).await?;
        }

        let mut writes = Vec::new();
        let mut written = Vec::new();
        for &handle in &reachable {
            let entity = self.unit_of_work.entity(handle)?;
            let schema = self.registry.schema(entity.entity_type())?;
            let record = self.encode(entity, schema)?;
            let data = serde_json::to_value(&record)?;
            let version = EntityVersion::from_content(data.to_string().as_bytes());

            if entity.version() == Some(&version) {
                continue;
            }

            let key = StorageKey::new(entity.entity_type(), record.id.key());
            let write = match entity.version() {
                Some(current) if !entity.is_new() => {
                    RecordWrite::update(key, data, current.clone(), version.clone())
                }
                _ => RecordWrite::insert(key, data, version.clone()),
            };
            writes.push(write);
            written.push((handle, record.id, version));
        }

        if writes.is_empty() {
            debug!("Flush found nothing to write");
            self.scheduled.clear();
            return Ok(());
        }

        let count = writes.len();
        self.store
            .commit(writes)
            .await
            .map_err(ConfiguratorError::storage)?;

        for (handle, id, version) in written {
            self.unit_of_work.entity_mut(handle)?.mark_managed(version);
            self.unit_of_work.register_identity(handle, id)?;
        }
        self.scheduled.clear();

        info!("Flushed {count} entities");
        Ok(())
    }

    /// Scheduled entities plus every link target present in the unit of
    /// work, in visit order. Unloaded references are skipped.
    fn reachable(&self) -> ConfiguratorResult<Vec<EntityHandle>> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<EntityHandle> = self.scheduled.iter().rev().copied().collect();

        while let Some(handle) = stack.pop() {
            if !seen.insert(handle) {
                continue;
            }
            order.push(handle);
            let entity = self.unit_of_work.entity(handle)?;
            for link in entity.links().values().rev() {
                for reference in link.refs().into_iter().rev() {
                    if let Some(target) = self.unit_of_work.resolve(reference) {
                        stack.push(target);
                    }
                }
            }
        }
        Ok(order)
    }

    async fn assign_identifier(&mut self, handle: EntityHandle) -> ConfiguratorResult<()> {
        let entity = self.unit_of_work.entity(handle)?;
        let schema = self.registry.schema(entity.entity_type())?;
        if entity.identifier(schema).is_some() {
            return Ok(());
        }

        let missing = schema
            .identifier
            .iter()
            .find(|field| entity.get(field).is_none_or(Value::is_null))
            .cloned()
            .unwrap_or_default();
        let missing_identifier = || ConfiguratorError::MissingIdentifier {
            entity_type: schema.name.clone(),
            field: missing.clone(),
        };

        let value = match (schema.id_strategy, schema.identifier.len()) {
            (IdStrategy::Auto, 1) => Value::from(
                self.store
                    .next_sequence(&schema.name)
                    .await
                    .map_err(ConfiguratorError::storage)?,
            ),
            (IdStrategy::Uuid, 1) => Value::String(uuid::Uuid::new_v4().to_string()),
            _ => return Err(missing_identifier()),
        };

        let id = Identifier::new(vec![value]);
        debug!("Assigned identifier {id} to new {}", schema.name);
        self.unit_of_work
            .entity_mut(handle)?
            .set_identifier(schema, &id);
        Ok(())
    }

    fn encode(&self, entity: &Entity, schema: &EntitySchema) -> ConfiguratorResult<StoredRecord> {
        let id = entity.identifier(schema).ok_or_else(|| ConfiguratorError::MissingIdentifier {
            entity_type: schema.name.clone(),
            field: schema.identifier.first().cloned().unwrap_or_default(),
        })?;

        let mut links = BTreeMap::new();
        for (name, link) in entity.links() {
            let stored = match link {
                Link::One(target) => StoredLink::One(
                    target
                        .as_ref()
                        .map(|reference| self.reference_id(reference))
                        .transpose()?,
                ),
                Link::Many(members) => StoredLink::Many(
                    members
                        .iter()
                        .map(|reference| self.reference_id(reference))
                        .collect::<ConfiguratorResult<_>>()?,
                ),
            };
            links.insert(name.clone(), stored);
        }

        Ok(StoredRecord {
            entity_type: schema.name.clone(),
            id,
            fields: entity.fields().clone(),
            links,
        })
    }

    fn reference_id(&self, reference: &EntityRef) -> ConfiguratorResult<Identifier> {
        match reference {
            EntityRef::Reference { id, .. } => Ok(id.clone()),
            EntityRef::Managed(handle) => {
                let target = self.unit_of_work.entity(*handle)?;
                let schema = self.registry.schema(target.entity_type())?;
                target
                    .identifier(schema)
                    .ok_or_else(|| ConfiguratorError::MissingIdentifier {
                        entity_type: schema.name.clone(),
                        field: schema.identifier.first().cloned().unwrap_or_default(),
                    })
            }
        }
    }
}

fn decode(schema: &EntitySchema, record: VersionedRecord) -> ConfiguratorResult<Entity> {
    let stored: StoredRecord = serde_json::from_value(record.data)?;

    let mut links = BTreeMap::new();
    for association in &schema.associations {
        let link = match (stored.links.get(&association.name), association.cardinality) {
            (Some(StoredLink::One(target)), Cardinality::One) => {
                Link::One(target.clone().map(|id| EntityRef::Reference {
                    entity_type: association.target.clone(),
                    id,
                }))
            }
            (Some(StoredLink::Many(members)), Cardinality::Many) => Link::Many(
                members
                    .iter()
                    .cloned()
                    .map(|id| EntityRef::Reference {
                        entity_type: association.target.clone(),
                        id,
                    })
                    .collect(),
            ),
            _ => Link::empty(association.cardinality),
        };
        links.insert(association.name.clone(), link);
    }

    Ok(Entity::managed(stored.entity_type, stored.fields, links, record.version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AssociationDefinition, FieldDefinition, FieldType};
    use crate::storage::{InMemoryStore, StorageError};
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        let user = EntitySchema::builder("User")
            .identifier(["id"])
            .field(FieldDefinition::new("id", FieldType::Integer))
            .field(FieldDefinition::new("email", FieldType::String))
            .association(AssociationDefinition::one("address", "Address"))
            .association(AssociationDefinition::many("tags", "Tag"))
            .build()
            .unwrap();
        let address = EntitySchema::builder("Address")
            .identifier(["id"])
            .id_strategy(IdStrategy::Uuid)
            .field(FieldDefinition::new("id", FieldType::Uuid))
            .field(FieldDefinition::new("zip", FieldType::String))
            .build()
            .unwrap();
        let tag = EntitySchema::builder("Tag")
            .identifier(["name"])
            .id_strategy(IdStrategy::Assigned)
            .field(FieldDefinition::new("name", FieldType::String))
            .build()
            .unwrap();
        let pair = EntitySchema::builder("Pair")
            .identifier(["left", "right"])
            .id_strategy(IdStrategy::Assigned)
            .field(FieldDefinition::new("left", FieldType::String))
            .field(FieldDefinition::new("right", FieldType::String))
            .build()
            .unwrap();

        Arc::new(
            SchemaRegistry::new()
                .with_schema(user)
                .and_then(|r| r.with_schema(address))
                .and_then(|r| r.with_schema(tag))
                .and_then(|r| r.with_schema(pair))
                .unwrap(),
        )
    }

    async fn user_with_address(manager: &mut EntityManager<InMemoryStore>) -> EntityHandle {
        let user = manager.create("User").unwrap();
        let address = manager.create("Address").unwrap();
        manager
            .unit_of_work_mut()
            .entity_mut(address)
            .unwrap()
            .fields_mut()
            .insert("zip".into(), json!("12345"));
        let entity = manager.unit_of_work_mut().entity_mut(user).unwrap();
        entity.fields_mut().insert("email".into(), json!("a@b.com"));
        entity.set_link("address", Link::One(Some(EntityRef::Managed(address))));
        user
    }

    #[tokio::test]
    async fn test_flush_cascades_and_assigns_identifiers() {
        let store = InMemoryStore::new();
        let mut manager = EntityManager::new(store.clone(), registry());
        let user = user_with_address(&mut manager).await;

        manager.persist(user).unwrap();
        manager.flush().await.unwrap();

        let entity = manager.unit_of_work().entity(user).unwrap();
        assert!(!entity.is_new());
        assert_eq!(entity.get("id"), Some(&json!(1)));
        assert_eq!(store.count("User").await.unwrap(), 1);
        assert_eq!(store.count("Address").await.unwrap(), 1);

        let stored = store.get(&StorageKey::new("User", "1")).await.unwrap().unwrap();
        assert!(stored.data["links"]["address"]["one"].is_array());
        assert_eq!(stored.data["links"]["tags"]["many"], json!([]));
    }

    #[tokio::test]
    async fn test_load_resolves_links_as_references() {
        let store = InMemoryStore::new();
        let mut manager = EntityManager::new(store.clone(), registry());
        let user = user_with_address(&mut manager).await;
        manager.persist(user).unwrap();
        manager.flush().await.unwrap();

        let mut fresh = EntityManager::new(store, registry());
        let loaded = fresh.load("User", &Identifier::single(1)).await.unwrap();
        let link = fresh
            .unit_of_work()
            .entity(loaded)
            .unwrap()
            .link("address")
            .cloned()
            .unwrap();
        let Link::One(Some(reference)) = link else {
            panic!("address should be linked");
        };
        assert!(matches!(reference, EntityRef::Reference { .. }));

        let address = fresh.resolve(&reference).await.unwrap();
        assert_eq!(
            fresh.unit_of_work().entity(address).unwrap().get("zip"),
            Some(&json!("12345"))
        );

        // Second load hits the identity map
        let again = fresh.load("User", &Identifier::single(1)).await.unwrap();
        assert_eq!(again, loaded);
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let mut manager = EntityManager::new(InMemoryStore::new(), registry());
        let err = manager.load("User", &Identifier::single(42)).await.unwrap_err();
        assert!(matches!(err, ConfiguratorError::EntityNotFound { .. }));
    }

    #[tokio::test]
    async fn test_assigned_identifier_required() {
        let mut manager = EntityManager::new(InMemoryStore::new(), registry());
        let tag = manager.create("Tag").unwrap();
        manager.persist(tag).unwrap();
        let err = manager.flush().await.unwrap_err();
        assert!(matches!(err, ConfiguratorError::MissingIdentifier { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn test_unchanged_entities_are_not_rewritten() {
        let store = InMemoryStore::new();
        let mut manager = EntityManager::new(store.clone(), registry());
        let user = user_with_address(&mut manager).await;
        manager.persist(user).unwrap();
        manager.flush().await.unwrap();
        let version = manager.unit_of_work().entity(user).unwrap().version().cloned();

        manager.persist(user).unwrap();
        manager.flush().await.unwrap();
        assert_eq!(manager.unit_of_work().entity(user).unwrap().version().cloned(), version);
    }

    #[tokio::test]
    async fn test_concurrent_modification_is_reported() {
        let store = InMemoryStore::new();
        let mut first = EntityManager::new(store.clone(), registry());
        let user = user_with_address(&mut first).await;
        first.persist(user).unwrap();
        first.flush().await.unwrap();

        let mut a = EntityManager::new(store.clone(), registry());
        let mut b = EntityManager::new(store.clone(), registry());
        let in_a = a.load("User", &Identifier::single(1)).await.unwrap();
        let in_b = b.load("User", &Identifier::single(1)).await.unwrap();

        a.unit_of_work_mut().entity_mut(in_a).unwrap().fields_mut().insert("email".into(), json!("a@x.com"));
        a.persist(in_a).unwrap();
        a.flush().await.unwrap();

        b.unit_of_work_mut().entity_mut(in_b).unwrap().fields_mut().insert("email".into(), json!("b@x.com"));
        b.persist(in_b).unwrap();
        let err = b.flush().await.unwrap_err();

        let ConfiguratorError::Storage(source) = err else {
            panic!("expected storage error");
        };
        let storage = source.downcast_ref::<StorageError>().unwrap();
        assert!(matches!(storage, StorageError::ConcurrentModification { .. }));
    }

    #[tokio::test]
    async fn test_composite_identifiers_with_separator_stay_distinct() {
        let store = InMemoryStore::new();
        let mut manager = EntityManager::new(store.clone(), registry());
        for (left, right) in [("a:b", "c"), ("a", "b:c")] {
            let pair = manager.create("Pair").unwrap();
            let fields = manager.unit_of_work_mut().entity_mut(pair).unwrap().fields_mut();
            fields.insert("left".into(), json!(left));
            fields.insert("right".into(), json!(right));
            manager.persist(pair).unwrap();
            manager.flush().await.unwrap();
        }
        assert_eq!(store.count("Pair").await.unwrap(), 2);

        let mut reader = EntityManager::new(store, registry());
        let id = Identifier::new(vec![json!("a"), json!("b:c")]);
        let loaded = reader.load("Pair", &id).await.unwrap();
        assert_eq!(
            reader.unit_of_work().entity(loaded).unwrap().get("left"),
            Some(&json!("a"))
        );
    }

    #[tokio::test]
    async fn test_find_all_pages_through_records() {
        let store = InMemoryStore::new();
        let mut manager = EntityManager::new(store.clone(), registry());
        for name in ["a", "b", "c"] {
            let tag = manager.create("Tag").unwrap();
            manager
                .unit_of_work_mut()
                .entity_mut(tag)
                .unwrap()
                .fields_mut()
                .insert("name".into(), json!(name));
            manager.persist(tag).unwrap();
        }
        manager.flush().await.unwrap();

        let mut reader = EntityManager::new(store, registry());
        let page = reader.find_all("Tag", 1, 5).await.unwrap();
        assert_eq!(page.len(), 2);
        let first = reader.unit_of_work().entity(page[0]).unwrap();
        assert_eq!(first.get("name"), Some(&json!("b")));
    }
}
