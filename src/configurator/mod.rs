//! Entity configurator: JSON payload → validated, persisted entity graph.
//!
//! [`EntityConfigurator::save`] and [`EntityConfigurator::create`] run one
//! request cycle: reset the unit of work, fill the root entity and its nested
//! relations from the payload, validate every populated entity, then persist
//! and flush. The returned [`ErrorTree`] mirrors the payload structure.
//!
//! # Modes
//!
//! | Mode | Identifier in payload | Identifier missing |
//! |------|----------------------|--------------------|
//! | [`FillMode::Strict`] | load | `InvalidPayload` |
//! | [`FillMode::Update`] | load | new entity |
//! | [`FillMode::Create`] | new entity (kept for `assigned` ids) | new entity |
//!
//! # Example
//!
//! ```rust
//! use entity_configurator::{EntityConfigurator, SchemaRegistry};
//! use entity_configurator::storage::InMemoryStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::from_json_str(r#"{
//!     "name": "User",
//!     "identifier": ["id"],
//!     "fields": [
//!         {"name": "id", "type": "integer"},
//!         {"name": "email", "type": "string", "constraints": [{"rule": "notBlank"}]}
//!     ]
//! }"#)?;
//!
//! let mut configurator = EntityConfigurator::new(InMemoryStore::new(), Arc::new(registry));
//! let errors = configurator.create(&json!({"email": "a@b.com"}), "User").await?;
//! assert!(errors.is_empty());
//!
//! let errors = configurator.save(&json!({"id": 1, "email": ""}), "User").await?;
//! assert_eq!(errors.message_at("email"), Some("must not be blank"));
//! # Ok(())
//! # }
//! ```

mod populator;

use crate::context::EntityContext;
use crate::entity::{Entity, EntityHandle, UnitOfWork};
use crate::error::{ConfiguratorError, ConfiguratorResult};
use crate::error_tree::ErrorTree;
use crate::manager::EntityManager;
use crate::schema::SchemaRegistry;
use crate::storage::EntityStore;
use crate::validation::{SchemaValidator, Validator};
use log::{debug, info, warn};
use populator::Populator;
use serde_json::Value;
use std::sync::Arc;

/// How the top-level entity is obtained from the payload identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Identifier required, entity loaded
    Strict,
    /// Loaded when identified, otherwise new
    Update,
    /// Always new
    Create,
}

/// Populates, validates and persists entities from JSON payloads.
pub struct EntityConfigurator<S: EntityStore> {
    manager: EntityManager<S>,
    validator: Box<dyn Validator>,
    context: EntityContext,
    root: Option<EntityHandle>,
}

impl<S: EntityStore> EntityConfigurator<S> {
    /// Configurator with the default context and the schema validator.
    pub fn new(store: S, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            manager: EntityManager::new(store, registry),
            validator: Box::new(SchemaValidator::new()),
            context: EntityContext::default(),
            root: None,
        }
    }

    pub fn with_context(mut self, context: EntityContext) -> Self {
        self.context = context;
        self
    }

    /// Replace the validator.
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn context(&self) -> &EntityContext {
        &self.context
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        self.manager.registry()
    }

    pub fn manager(&self) -> &EntityManager<S> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut EntityManager<S> {
        &mut self.manager
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        self.manager.unit_of_work()
    }

    /// Handle of the root entity of the last top-level fill.
    pub fn entity(&self) -> Option<EntityHandle> {
        self.root
    }

    /// The root entity of the last top-level fill.
    pub fn root_entity(&self) -> Option<&Entity> {
        self.root.and_then(|handle| self.unit_of_work().get(handle))
    }

    /// Populate and validate an entity graph without persisting it.
    ///
    /// The unit of work is kept, so entities loaded by earlier fills are
    /// reused. The returned handle becomes the root.
    pub async fn fill(
        &mut self,
        payload: &Value,
        entity_type: &str,
        mode: FillMode,
    ) -> ConfiguratorResult<(EntityHandle, ErrorTree)> {
        let Value::Object(map) = payload else {
            return Err(ConfiguratorError::invalid_payload(format!(
                "payload for {entity_type} must be a JSON object"
            )));
        };

        debug!("Filling {entity_type} in {mode:?} mode");
        let mut populator = Populator {
            manager: &mut self.manager,
            validator: self.validator.as_ref(),
            context: &self.context,
        };
        let (handle, errors) = populator
            .fill_node(map.clone(), entity_type.to_string(), mode, None, 0)
            .await?;

        self.root = Some(handle);
        Ok((handle, errors))
    }

    /// Fill requiring the payload to identify an existing entity.
    pub async fn fill_strict(
        &mut self,
        payload: &Value,
        entity_type: &str,
    ) -> ConfiguratorResult<(EntityHandle, ErrorTree)> {
        self.fill(payload, entity_type, FillMode::Strict).await
    }

    /// Update the identified entity, or create one when the payload carries
    /// no identifier, then persist.
    pub async fn save(&mut self, payload: &Value, entity_type: &str) -> ConfiguratorResult<ErrorTree> {
        self.persist_with(payload, entity_type, FillMode::Update).await
    }

    /// Create a new entity from the payload, then persist.
    pub async fn create(&mut self, payload: &Value, entity_type: &str) -> ConfiguratorResult<ErrorTree> {
        self.persist_with(payload, entity_type, FillMode::Create).await
    }

    /// One full request cycle in the given mode.
    ///
    /// With `throw_on_error` set, a non-empty error tree becomes
    /// `ValidationFailed` and nothing is written. Otherwise the graph is
    /// persisted even when invalid and the tree is returned.
    pub async fn persist_with(
        &mut self,
        payload: &Value,
        entity_type: &str,
        mode: FillMode,
    ) -> ConfiguratorResult<ErrorTree> {
        self.manager.clear();
        self.root = None;

        let (handle, errors) = self.fill(payload, entity_type, mode).await?;

        if !errors.is_empty() {
            if self.context.throw_on_error() {
                warn!(
                    "{entity_type} rejected with {} validation error(s)",
                    errors.message_count()
                );
                return Err(ConfiguratorError::ValidationFailed(errors));
            }
            debug!(
                "{entity_type} persisted with {} validation error(s)",
                errors.message_count()
            );
        }

        self.manager.persist(handle)?;
        self.manager.flush().await?;
        info!("{mode:?} of {entity_type} completed");
        Ok(errors)
    }
}
