//! Recursive population of entity graphs from JSON payloads.

use super::FillMode;
use crate::context::EntityContext;
use crate::entity::{EntityHandle, EntityRef, Identifier, Link};
use crate::error::{ConfiguratorError, ConfiguratorResult};
use crate::error_tree::ErrorTree;
use crate::manager::EntityManager;
use crate::schema::{AssociationDefinition, Cardinality, EntityHandler, IdStrategy};
use crate::storage::EntityStore;
use crate::validation::{Validator, flatten};
use log::{debug, trace};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Borrowed view of a configurator for the duration of one fill.
pub(crate) struct Populator<'a, S: EntityStore> {
    pub(crate) manager: &'a mut EntityManager<S>,
    pub(crate) validator: &'a dyn Validator,
    pub(crate) context: &'a EntityContext,
}

impl<S: EntityStore> Populator<'_, S> {
    /// Fill one payload level. `target` is the already resolved entity for
    /// nested levels; the top level resolves its own from the identifier.
    pub(crate) fn fill_node(
        &mut self,
        mut payload: Map<String, Value>,
        entity_type: String,
        mode: FillMode,
        target: Option<EntityHandle>,
        depth: usize,
    ) -> BoxFuture<'_, ConfiguratorResult<(EntityHandle, ErrorTree)>> {
        Box::pin(async move {
            if depth > self.context.max_depth() {
                return Err(ConfiguratorError::DepthLimitExceeded {
                    max_depth: self.context.max_depth(),
                });
            }

            let handler = Arc::clone(self.manager.registry().handler(&entity_type)?);
            let schema = &handler.schema;

            let id_values: Vec<(String, Option<Value>)> = schema
                .identifier
                .iter()
                .map(|field| {
                    let value = payload.remove(field).filter(|v| !v.is_null());
                    (field.clone(), value)
                })
                .collect();

            let handle = match target {
                Some(handle) => handle,
                None => self.resolve_root(&handler, &id_values, mode).await?,
            };
            trace!("Filling {entity_type} {handle} at depth {depth}");

            for field in schema.scalar_fields() {
                if let Some(value) = payload.get(&field.name) {
                    let entity = self.manager.unit_of_work_mut().entity_mut(handle)?;
                    handler.assign(entity, &field.name, value.clone())?;
                }
            }

            let mut errors = ErrorTree::new();
            if !payload.is_empty() {
                let context = self.context;
                let relations = context.relation_map();
                for association in &schema.associations {
                    if relations.is_skipped(&association.name) {
                        continue;
                    }
                    let sources: Vec<String> = relations
                        .source_fields(&association.name)
                        .into_iter()
                        .map(String::from)
                        .collect();
                    if !relations.has_mapping(&association.name)
                        && !sources.iter().any(|source| payload.contains_key(source))
                    {
                        continue;
                    }

                    for source in &sources {
                        let Some(data) = payload.get(source).filter(|v| !v.is_null()) else {
                            continue;
                        };
                        let child_errors = self
                            .fill_relation(handle, association, data.clone(), mode, depth)
                            .await?;
                        errors.merge_tree(association.name.clone(), child_errors);
                    }
                }
            }

            let entity = self.manager.unit_of_work().entity(handle)?;
            let violations = self.validator.validate(entity, schema);
            if !violations.is_empty() {
                debug!("{entity_type} {handle} has {} violation(s)", violations.len());
            }
            errors.extend_messages(flatten(violations));

            Ok((handle, errors))
        })
    }

    /// Top-level entity per mode: load, instantiate or reject.
    async fn resolve_root(
        &mut self,
        handler: &EntityHandler,
        id_values: &[(String, Option<Value>)],
        mode: FillMode,
    ) -> ConfiguratorResult<EntityHandle> {
        let schema = &handler.schema;
        let missing: Vec<&str> = id_values
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(field, _)| field.as_str())
            .collect();
        let complete = || Identifier::new(id_values.iter().filter_map(|(_, v)| v.clone()).collect());

        match mode {
            FillMode::Strict => {
                if let Some(field) = missing.first() {
                    return Err(ConfiguratorError::invalid_payload(format!(
                        "identifier field '{field}' is required for {}",
                        schema.name
                    )));
                }
                self.manager.load(&schema.name, &complete()).await
            }
            FillMode::Update => {
                if missing.is_empty() {
                    self.manager.load(&schema.name, &complete()).await
                } else if missing.len() == id_values.len() {
                    self.manager.create(&schema.name)
                } else {
                    Err(ConfiguratorError::invalid_payload(format!(
                        "incomplete identifier for {}: missing '{}'",
                        schema.name,
                        missing.join("', '")
                    )))
                }
            }
            FillMode::Create => {
                let handle = self.manager.create(&schema.name)?;
                if schema.id_strategy == IdStrategy::Assigned {
                    let entity = self.manager.unit_of_work_mut().entity_mut(handle)?;
                    for (field, value) in id_values {
                        if let Some(value) = value {
                            entity.fields_mut().insert(field.clone(), value.clone());
                        }
                    }
                }
                Ok(handle)
            }
        }
    }

    /// Populate one association from one payload value.
    async fn fill_relation(
        &mut self,
        parent: EntityHandle,
        association: &AssociationDefinition,
        data: Value,
        mode: FillMode,
        depth: usize,
    ) -> ConfiguratorResult<ErrorTree> {
        match (data, association.cardinality) {
            (Value::Object(map), _) => self.fill_member(parent, association, map, mode, depth).await,
            (Value::Array(items), Cardinality::Many) => {
                let mut errors = ErrorTree::new();
                for (index, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Object(map) => {
                            let item_errors = self
                                .fill_member(parent, association, map, mode, depth)
                                .await?;
                            errors.merge_tree(index.to_string(), item_errors);
                        }
                        Value::Null => {}
                        other => {
                            return Err(ConfiguratorError::invalid_payload(format!(
                                "item {index} of relation '{}' must be an object, got {other}",
                                association.name
                            )));
                        }
                    }
                }
                Ok(errors)
            }
            (other, _) => Err(ConfiguratorError::invalid_payload(format!(
                "relation '{}' must be an object{}, got {other}",
                association.name,
                if association.cardinality == Cardinality::Many {
                    " or an array of objects"
                } else {
                    ""
                }
            ))),
        }
    }

    async fn fill_member(
        &mut self,
        parent: EntityHandle,
        association: &AssociationDefinition,
        map: Map<String, Value>,
        mode: FillMode,
        depth: usize,
    ) -> ConfiguratorResult<ErrorTree> {
        let target_schema = self.manager.registry().schema(&association.target)?;
        let present = target_schema
            .identifier
            .iter()
            .filter(|field| map.get(*field).is_some_and(|v| !v.is_null()))
            .count();
        // Identifiers are all or nothing; strict mode never creates
        if present > 0 && present < target_schema.identifier.len() {
            return Err(ConfiguratorError::invalid_payload(format!(
                "incomplete identifier for {} in relation '{}'",
                association.target, association.name
            )));
        }
        if present == 0 && mode == FillMode::Strict {
            return Err(ConfiguratorError::invalid_payload(format!(
                "identifier is required for {} in relation '{}'",
                association.target, association.name
            )));
        }

        let child = match Identifier::extract(&target_schema.identifier, &map) {
            Some(id) => {
                let child = self.manager.load(&association.target, &id).await?;
                self.link(parent, association, child)?;
                child
            }
            None => match self.linked_target(parent, association)? {
                Some(reference) => self.manager.resolve(&reference).await?,
                None => {
                    let child = self.manager.create(&association.target)?;
                    self.link(parent, association, child)?;
                    child
                }
            },
        };

        let (_, errors) = self
            .fill_node(map, association.target.clone(), mode, Some(child), depth + 1)
            .await?;
        Ok(errors)
    }

    /// Current target of a to-one link; `None` for to-many relations.
    fn linked_target(
        &self,
        parent: EntityHandle,
        association: &AssociationDefinition,
    ) -> ConfiguratorResult<Option<EntityRef>> {
        if association.cardinality == Cardinality::Many {
            return Ok(None);
        }
        let entity = self.manager.unit_of_work().entity(parent)?;
        Ok(match entity.link(&association.name) {
            Some(Link::One(target)) => target.clone(),
            _ => None,
        })
    }

    /// To-one: point at `child`. To-many: add `child` unless already a member.
    fn link(
        &mut self,
        parent: EntityHandle,
        association: &AssociationDefinition,
        child: EntityHandle,
    ) -> ConfiguratorResult<()> {
        let unit_of_work = self.manager.unit_of_work();
        let linked = unit_of_work
            .entity(parent)?
            .link(&association.name)
            .is_some_and(|link| {
                link.refs()
                    .into_iter()
                    .any(|reference| unit_of_work.refers_to(reference, child))
            });
        if linked {
            return Ok(());
        }

        let entity = self.manager.unit_of_work_mut().entity_mut(parent)?;
        match entity.link_mut(&association.name, association.cardinality) {
            Link::One(target) => *target = Some(EntityRef::Managed(child)),
            Link::Many(members) => members.push(EntityRef::Managed(child)),
        }
        Ok(())
    }
}
