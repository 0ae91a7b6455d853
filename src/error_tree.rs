//! Hierarchical validation report mirroring an entity's relation structure.
//!
//! Leaves are messages for scalar fields, branches are the reports of related
//! entities keyed by relation name. Serializes to plain JSON:
//!
//! ```rust
//! use entity_configurator::ErrorTree;
//! use serde_json::json;
//!
//! let mut address = ErrorTree::new();
//! address.insert_message("zip", "invalid format");
//!
//! let mut tree = ErrorTree::new();
//! tree.insert_message("email", "must not be blank");
//! tree.merge_tree("address", address);
//!
//! assert_eq!(
//!     serde_json::to_value(&tree).unwrap(),
//!     json!({"email": "must not be blank", "address": {"zip": "invalid format"}})
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field or relation name → message or nested report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorTree(BTreeMap<String, ErrorNode>);

/// One entry of an [`ErrorTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorNode {
    Message(String),
    Tree(ErrorTree),
}

impl ErrorTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the entity and every populated descendant are valid.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&ErrorNode> {
        self.0.get(key)
    }

    /// Message stored under a dotted path such as `address.zip`.
    pub fn message_at(&self, path: &str) -> Option<&str> {
        let mut current = self;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            match (current.0.get(part)?, parts.peek()) {
                (ErrorNode::Message(message), None) => return Some(message),
                (ErrorNode::Tree(tree), Some(_)) => current = tree,
                _ => return None,
            }
        }
        None
    }

    /// Sub-report for a relation.
    pub fn subtree(&self, key: &str) -> Option<&ErrorTree> {
        match self.0.get(key)? {
            ErrorNode::Tree(tree) => Some(tree),
            ErrorNode::Message(_) => None,
        }
    }

    /// Set a leaf message; replaces whatever was stored under `key`.
    pub fn insert_message(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.0.insert(key.into(), ErrorNode::Message(message.into()));
    }

    /// Merge a child report under `key`. Empty reports are dropped, two
    /// reports under the same key are merged recursively.
    pub fn merge_tree(&mut self, key: impl Into<String>, tree: ErrorTree) {
        if tree.is_empty() {
            return;
        }
        let key = key.into();
        match self.0.get_mut(&key) {
            Some(ErrorNode::Tree(existing)) => existing.merge(tree),
            _ => {
                self.0.insert(key, ErrorNode::Tree(tree));
            }
        }
    }

    /// Deep-merge another report into this one.
    pub fn merge(&mut self, other: ErrorTree) {
        for (key, node) in other.0 {
            match node {
                ErrorNode::Message(message) => self.insert_message(key, message),
                ErrorNode::Tree(tree) => self.merge_tree(key, tree),
            }
        }
    }

    /// Add leaf messages from a flattened violation map; later entries win.
    pub fn extend_messages<I, K, V>(&mut self, messages: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, message) in messages {
            self.insert_message(key, message);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ErrorNode)> {
        self.0.iter()
    }

    /// Number of leaf messages in the whole tree.
    pub fn message_count(&self) -> usize {
        self.0
            .values()
            .map(|node| match node {
                ErrorNode::Message(_) => 1,
                ErrorNode::Tree(tree) => tree.message_count(),
            })
            .sum()
    }
}

impl fmt::Display for ErrorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{} error(s)", self.message_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_children_are_dropped() {
        let mut tree = ErrorTree::new();
        tree.merge_tree("address", ErrorTree::new());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_merge_same_relation_keeps_both_children() {
        let mut billing = ErrorTree::new();
        billing.insert_message("zip", "invalid format");
        let mut shipping = ErrorTree::new();
        shipping.insert_message("city", "must not be blank");

        let mut tree = ErrorTree::new();
        tree.merge_tree("address", billing);
        tree.merge_tree("address", shipping);

        assert_eq!(tree.message_at("address.zip"), Some("invalid format"));
        assert_eq!(tree.message_at("address.city"), Some("must not be blank"));
        assert_eq!(tree.message_count(), 2);
    }

    #[test]
    fn test_leaf_message_replaces_child_tree() {
        let mut child = ErrorTree::new();
        child.insert_message("zip", "invalid format");
        let mut tree = ErrorTree::new();
        tree.merge_tree("address", child);
        tree.extend_messages([("address", "must not be null")]);

        assert_eq!(tree.message_at("address"), Some("must not be null"));
        assert!(tree.subtree("address").is_none());
    }

    #[test]
    fn test_round_trip_shape() {
        let value = json!({"email": "must not be blank", "tags": {"0": {"label": "too long"}}});
        let tree: ErrorTree = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(tree.message_at("tags.0.label"), Some("too long"));
        assert_eq!(serde_json::to_value(&tree).unwrap(), value);
    }
}
