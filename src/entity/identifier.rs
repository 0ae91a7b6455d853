//! Entity identifiers.
//!
//! An [`Identifier`] holds the values of a type's identifier fields in
//! declaration order. `serde_json::Value` is not hashable, so equality and
//! hashing go through a canonical string key: components joined with `:`,
//! with `\` and `:` inside a component escaped by a backslash.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Value>", into = "Vec<Value>")]
pub struct Identifier {
    values: Vec<Value>,
    key: String,
}

impl Identifier {
    pub fn new(values: Vec<Value>) -> Self {
        let key = values
            .iter()
            .map(canonical)
            .collect::<Vec<_>>()
            .join(":");
        Self { values, key }
    }

    /// Single-valued identifier.
    pub fn single(value: impl Into<Value>) -> Self {
        Self::new(vec![value.into()])
    }

    /// Read identifier values out of a payload or field map.
    ///
    /// Returns `None` unless every field has a non-null value.
    pub fn extract(fields: &[String], data: &Map<String, Value>) -> Option<Self> {
        let values = fields
            .iter()
            .map(|field| data.get(field).filter(|v| !v.is_null()).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(Self::new(values))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Canonical string form, used as storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Pair values back up with their field names.
    pub fn to_map(&self, fields: &[String]) -> Map<String, Value> {
        fields
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

fn canonical(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if !text.contains(['\\', ':']) {
        return text;
    }
    let mut escaped = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        if c == '\\' || c == ':' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl From<Vec<Value>> for Identifier {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl From<Identifier> for Vec<Value> {
    fn from(identifier: Identifier) -> Self {
        identifier.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_requires_every_field() {
        let fields = vec!["user".to_string(), "team".to_string()];
        let data = json!({"user": 1, "team": "core", "role": "owner"});
        let id = Identifier::extract(&fields, data.as_object().unwrap()).unwrap();
        assert_eq!(id.key(), "1:core");

        let partial = json!({"user": 1});
        assert!(Identifier::extract(&fields, partial.as_object().unwrap()).is_none());

        let null = json!({"user": 1, "team": null});
        assert!(Identifier::extract(&fields, null.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_equality_follows_canonical_key() {
        assert_eq!(Identifier::single(5), Identifier::single(5));
        assert_ne!(Identifier::single(5), Identifier::single(6));
        assert_eq!(Identifier::single("abc").to_string(), "abc");
    }

    #[test]
    fn test_separator_inside_values_stays_distinct() {
        let left = Identifier::new(vec![json!("a:b"), json!("c")]);
        let right = Identifier::new(vec![json!("a"), json!("b:c")]);
        assert_ne!(left, right);
        assert_ne!(left.key(), right.key());
        assert_eq!(left.key(), "a\\:b:c");
        assert_eq!(right.key(), "a:b\\:c");

        let slashes = Identifier::new(vec![json!("a\\"), json!("b")]);
        let colon = Identifier::new(vec![json!("a\\:b")]);
        assert_ne!(slashes.key(), colon.key());
    }

    #[test]
    fn test_to_map() {
        let id = Identifier::single(7);
        assert_eq!(Value::Object(id.to_map(&["id".to_string()])), json!({"id": 7}));
    }
}
