//! Consumer strategies for siftql
//!
//! A Consumer extracts a named field's value from a row, decoupling the
//! evaluator tree from the concrete row shape. Two implementations ship
//! with the crate: map lookup over JoinableMap and an explicit accessor
//! registry for native structs.

use std::collections::HashMap;

use crate::core::errors::{QueryError, Result};
use crate::core::row::JoinableMap;
use crate::core::value::Value;

/// Strategy for extracting a named field's value from a row
pub trait Consumer<R> {
    /// Extract the value of `field` from `row`
    fn get(&self, row: &R, field: &str) -> Result<Value>;
}

/// Map-lookup consumer over JoinableMap rows.
///
/// Rows are schemaless, so a missing key is Null rather than an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapConsumer;

impl Consumer<JoinableMap> for MapConsumer {
    fn get(&self, row: &JoinableMap, field: &str) -> Result<Value> {
        Ok(row.get(field).cloned().unwrap_or(Value::Null))
    }
}

type Accessor<R> = Box<dyn Fn(&R) -> Value + Send + Sync>;

/// Accessor-registry consumer for native structs.
///
/// Each queryable field is registered with a closure reading it off the
/// struct. Requesting an unregistered field is an error: a missing accessor
/// must fail loudly, not masquerade as a non-matching row.
pub struct FieldConsumer<R> {
    accessors: HashMap<String, Accessor<R>>,
}

impl<R> FieldConsumer<R> {
    pub fn new() -> Self {
        FieldConsumer {
            accessors: HashMap::new(),
        }
    }

    /// Register an accessor for a field name
    pub fn field(
        mut self,
        name: impl Into<String>,
        accessor: impl Fn(&R) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.accessors.insert(name.into(), Box::new(accessor));
        self
    }
}

impl<R> Default for FieldConsumer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Consumer<R> for FieldConsumer<R> {
    fn get(&self, row: &R, field: &str) -> Result<Value> {
        match self.accessors.get(field) {
            Some(accessor) => Ok(accessor(row)),
            None => Err(QueryError::FieldAccess(format!(
                "no accessor registered for field '{}'",
                field
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Character {
        name: &'static str,
        weight: i64,
    }

    #[test]
    fn test_map_consumer_missing_key_is_null() {
        let row = JoinableMap::new().with("name", "alice");
        let consumer = MapConsumer;

        assert_eq!(
            consumer.get(&row, "name").unwrap(),
            Value::String("alice".to_string())
        );
        assert_eq!(consumer.get(&row, "age").unwrap(), Value::Null);
    }

    #[test]
    fn test_field_consumer_reads_struct_fields() {
        let consumer = FieldConsumer::new()
            .field("name", |c: &Character| c.name.into())
            .field("weight", |c: &Character| c.weight.into());
        let row = Character {
            name: "gimli",
            weight: 80,
        };

        assert_eq!(
            consumer.get(&row, "name").unwrap(),
            Value::String("gimli".to_string())
        );
        assert_eq!(consumer.get(&row, "weight").unwrap(), Value::Integer(80));
    }

    #[test]
    fn test_field_consumer_missing_accessor_is_error() {
        let consumer: FieldConsumer<Character> = FieldConsumer::new();
        let row = Character {
            name: "gimli",
            weight: 80,
        };

        let err = consumer.get(&row, "height").unwrap_err();
        assert!(matches!(err, QueryError::FieldAccess(_)));
    }
}
