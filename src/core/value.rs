//! Value module for siftql
//!
//! This module defines the Value enum, representing the literal values a
//! query compares against and the field values extracted from rows.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::core::errors::{QueryError, Result};

/// A compiled regular expression usable as a LIKE literal.
///
/// Only constructible through the builder API; the text compiler always
/// produces plain string literals.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(regex: Regex) -> Self {
        Pattern(regex)
    }

    /// The pattern source text
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Full-match test: the pattern must cover the whole input.
    pub fn matches(&self, input: &str) -> bool {
        self.0
            .find(input)
            .map(|m| m.start() == 0 && m.end() == input.len())
            .unwrap_or(false)
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Pattern(regex)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_str().hash(state);
    }
}

/// The different kinds of values flowing through a query
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Ordered collection of values (IN lists, multi-valued fields)
    Array(Vec<Value>),
    /// Nested named values
    Object(BTreeMap<String, Value>),
    /// Compiled regular expression (LIKE literal, builder-only)
    Pattern(Pattern),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if the value is a number (integer or float)
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Check if the value is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Get a string representation of the value's type
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Pattern(_) => "pattern",
        }
    }

    /// Total order over mutually comparable values.
    ///
    /// Integers and floats compare numerically across each other; any other
    /// cross-type comparison is a type error so a malformed query fails
    /// loudly instead of silently dropping rows.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => Ok(l.cmp(r)),
            (Value::Float(l), Value::Float(r)) => Ok(l.total_cmp(r)),
            (Value::Integer(l), Value::Float(r)) => Ok((*l as f64).total_cmp(r)),
            (Value::Float(l), Value::Integer(r)) => Ok(l.total_cmp(&(*r as f64))),
            (Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
            (Value::Boolean(l), Value::Boolean(r)) => Ok(l.cmp(r)),
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            _ => Err(QueryError::Type(format!(
                "cannot compare {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(l), Value::Boolean(r)) => l == r,
            (Value::Integer(l), Value::Integer(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l.to_bits() == r.to_bits(),
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Array(l), Value::Array(r)) => l == r,
            (Value::Object(l), Value::Object(r)) => l == r,
            (Value::Pattern(l), Value::Pattern(r)) => l == r,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Array(items) => items.hash(state),
            Value::Object(map) => map.hash(state),
            Value::Pattern(p) => p.hash(state),
        }
    }
}

/// Format a Value in the literal syntax the compiler reads back
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Array(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Object(_) => {
                write!(f, "{}", serde_json::Value::from(self))
            }
            Value::Pattern(p) => write!(f, "{}", p.as_str()),
        }
    }
}

/// Convert from common types to Value
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
            Value::Pattern(p) => serde_json::Value::String(p.as_str().to_string()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serde_json::Value::from(self).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_types() {
        assert!(Value::Null.is_null());
        assert!(Value::Integer(42).is_number());
        assert!(Value::Float(3.5).is_number());
        assert!(Value::String("hello".to_string()).is_string());
        assert_eq!(Value::Array(vec![]).type_name(), "array");
    }

    #[test]
    fn test_value_conversion() {
        let int_value: Value = 42.into();
        let bool_value: Value = true.into();
        let string_value: Value = "Hello".into();

        assert_eq!(int_value, Value::Integer(42));
        assert_eq!(bool_value, Value::Boolean(true));
        assert_eq!(string_value, Value::String("Hello".to_string()));
    }

    #[test]
    fn test_compare_numeric_coercion() {
        assert_eq!(
            Value::Integer(2).compare(&Value::Float(2.5)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::Float(3.0).compare(&Value::Integer(3)).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            Value::String("b".into())
                .compare(&Value::String("a".into()))
                .unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_compare_type_mismatch_is_error() {
        let err = Value::Integer(1).compare(&Value::String("1".into()));
        assert!(err.is_err());
        let err = Value::Null.compare(&Value::Integer(1));
        assert!(err.is_err());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::String("Hello".to_string()).to_string(), "'Hello'");
        let list = Value::Array(vec![1.into(), 2.into(), 3.into()]);
        assert_eq!(list.to_string(), "(1, 2, 3)");
    }

    #[test]
    fn test_json_conversion() {
        let v = Value::from(json!({"name": "alice", "age": 30, "tags": ["a", "b"]}));
        if let Value::Object(map) = &v {
            assert_eq!(map.get("name"), Some(&Value::String("alice".into())));
            assert_eq!(map.get("age"), Some(&Value::Integer(30)));
        } else {
            panic!("expected object value");
        }
        let back = serde_json::Value::from(&v);
        assert_eq!(back["tags"][1], json!("b"));
    }

    #[test]
    fn test_pattern_full_match() {
        let p = Pattern::new(Regex::new("ab+c").unwrap());
        assert!(p.matches("abbc"));
        assert!(!p.matches("xabbcx"));
    }
}
