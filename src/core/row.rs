//! Row module for siftql
//!
//! This module defines JoinableMap, the generic mergeable named row that
//! joins and result sets flow through when no richer object model exists.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::core::value::Value;

/// A row that can absorb another row of the same shape during a join
pub trait Joinable {
    /// Merge `other`'s fields into the receiver, last-write-wins
    fn join(&mut self, other: &Self);
}

/// A generic named row over unique string keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinableMap {
    values: BTreeMap<String, Value>,
}

impl JoinableMap {
    /// Create an empty row
    pub fn new() -> Self {
        JoinableMap {
            values: BTreeMap::new(),
        }
    }

    /// Get the value stored under the given field name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Store a value under the given field name, replacing any previous one
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Chainable variant of `put`, mainly for building fixtures
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(name, value);
        self
    }

    /// Check whether the row holds the given field
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of fields in the row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether the row has no fields
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the row's fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl Joinable for JoinableMap {
    fn join(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }
}

impl FromIterator<(String, Value)> for JoinableMap {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        JoinableMap {
            values: iter.into_iter().collect(),
        }
    }
}

/// Build a row from a JSON object; non-object JSON yields an empty row
impl From<serde_json::Value> for JoinableMap {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Object(map) => {
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
            }
            _ => JoinableMap::new(),
        }
    }
}

impl Serialize for JoinableMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_and_get() {
        let mut row = JoinableMap::new();
        row.put("name", "alice");
        row.put("age", 30);

        assert_eq!(row.get("name"), Some(&Value::String("alice".to_string())));
        assert_eq!(row.get("age"), Some(&Value::Integer(30)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_join_merges_last_write_wins() {
        let mut left = JoinableMap::new().with("id", 1).with("name", "alice");
        let right = JoinableMap::new().with("name", "bob").with("city", "lyon");

        left.join(&right);

        assert_eq!(left.len(), 3);
        assert_eq!(left.get("id"), Some(&Value::Integer(1)));
        assert_eq!(left.get("name"), Some(&Value::String("bob".to_string())));
        assert_eq!(left.get("city"), Some(&Value::String("lyon".to_string())));
    }

    #[test]
    fn test_from_json_object() {
        let row = JoinableMap::from(json!({"id": 7, "active": true}));
        assert_eq!(row.get("id"), Some(&Value::Integer(7)));
        assert_eq!(row.get("active"), Some(&Value::Boolean(true)));

        let empty = JoinableMap::from(json!([1, 2, 3]));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_serialize_as_json_object() {
        let row = JoinableMap::new().with("id", 1).with("name", "alice");
        let text = serde_json::to_string(&row).unwrap();
        assert_eq!(text, r#"{"id":1,"name":"alice"}"#);
    }
}
