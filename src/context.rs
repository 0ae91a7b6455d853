//! Entity context: behavior flags and relation mapping for population.
//!
//! The context is configuration. It is built once (in code or from JSON),
//! handed to the configurator and only read during a fill.
//!
//! ```rust
//! use entity_configurator::EntityContext;
//!
//! let context = EntityContext::builder()
//!     .throw_on_error(true)
//!     .relation("address", ["billingAddress", "shippingAddress"])
//!     .skip_relation("owner")
//!     .build();
//!
//! assert!(context.throw_on_error());
//! assert_eq!(
//!     context.relation_map().source_fields("address"),
//!     vec!["billingAddress", "shippingAddress"]
//! );
//! assert_eq!(context.relation_map().source_fields("tags"), vec!["tags"]);
//! ```

use crate::error::{ConfiguratorError, ConfiguratorResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Default bound on payload nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Logical relation name → payload keys it is populated from, plus the
/// relations that are never populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationMap {
    #[serde(default)]
    relations: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    skip_relations: BTreeSet<String>,
}

impl RelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a relation onto one or more payload keys.
    pub fn insert<I, S>(&mut self, relation: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations
            .insert(relation.into(), fields.into_iter().map(Into::into).collect());
    }

    pub fn skip(&mut self, relation: impl Into<String>) {
        self.skip_relations.insert(relation.into());
    }

    /// Payload keys for a relation; the relation name itself when unmapped.
    pub fn source_fields<'a>(&'a self, relation: &'a str) -> Vec<&'a str> {
        match self.relations.get(relation) {
            Some(fields) => fields.iter().map(String::as_str).collect(),
            None => vec![relation],
        }
    }

    pub fn has_mapping(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    pub fn is_skipped(&self, relation: &str) -> bool {
        self.skip_relations.contains(relation)
    }
}

/// Configuration shared by one fill invocation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityContext {
    /// Abort with `ValidationFailed` instead of returning errors
    #[serde(default)]
    throw_on_error: bool,
    #[serde(flatten)]
    relation_map: RelationMap,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for EntityContext {
    fn default() -> Self {
        Self {
            throw_on_error: false,
            relation_map: RelationMap::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EntityContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EntityContextBuilder {
        EntityContextBuilder {
            context: Self::default(),
        }
    }

    /// Parse a context from JSON, e.g.
    /// `{"throwOnError": true, "relations": {"address": ["billingAddress"]}, "skipRelations": ["owner"]}`.
    pub fn from_json_str(content: &str) -> ConfiguratorResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a context from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfiguratorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfiguratorError::internal(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    pub fn throw_on_error(&self) -> bool {
        self.throw_on_error
    }

    pub fn relation_map(&self) -> &RelationMap {
        &self.relation_map
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Builder for [`EntityContext`].
#[derive(Debug, Clone)]
pub struct EntityContextBuilder {
    context: EntityContext,
}

impl EntityContextBuilder {
    pub fn throw_on_error(mut self, throw: bool) -> Self {
        self.context.throw_on_error = throw;
        self
    }

    pub fn relation<I, S>(mut self, relation: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context.relation_map.insert(relation, fields);
        self
    }

    pub fn skip_relation(mut self, relation: impl Into<String>) -> Self {
        self.context.relation_map.skip(relation);
        self
    }

    pub fn relation_map(mut self, relation_map: RelationMap) -> Self {
        self.context.relation_map = relation_map;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.context.max_depth = max_depth;
        self
    }

    pub fn build(self) -> EntityContext {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let context = EntityContext::default();
        assert!(!context.throw_on_error());
        assert_eq!(context.max_depth(), DEFAULT_MAX_DEPTH);
        assert!(!context.relation_map().has_mapping("address"));
        assert!(!context.relation_map().is_skipped("address"));
    }

    #[test]
    fn test_from_json() {
        let context = EntityContext::from_json_str(
            r#"{
                "throwOnError": true,
                "relations": {"address": ["billingAddress", "shippingAddress"]},
                "skipRelations": ["owner"]
            }"#,
        )
        .unwrap();

        assert!(context.throw_on_error());
        assert!(context.relation_map().has_mapping("address"));
        assert!(context.relation_map().is_skipped("owner"));
        assert_eq!(context.max_depth(), DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(EntityContext::from_json_str("{}").unwrap(), EntityContext::default());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EntityContext::from_json_str("{\"throwOnError\": 1}"),
            Err(ConfiguratorError::Json(_))
        ));
    }
}
