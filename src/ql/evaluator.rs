//! Evaluator tree for siftql
//!
//! A query's WHERE clause compiles to a tree of evaluators: leaves compare
//! one named field's extracted value against a literal, And/Or nodes compose
//! them. Nodes are immutable values owned by their containing collection.

use std::cmp::Ordering;
use std::fmt;

use log::warn;

use crate::core::consumer::Consumer;
use crate::core::errors::{QueryError, Result};
use crate::core::value::Value;

/// Comparison operator of a leaf evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    Distinct,
    GreaterThan,
    GreaterThanOrEquals,
    SmallerThan,
    SmallerThanOrEquals,
    In,
    NotIn,
    Like,
}

impl Operator {
    /// Query-language spelling of the operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::Distinct => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEquals => ">=",
            Operator::SmallerThan => "<",
            Operator::SmallerThanOrEquals => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
        }
    }

    /// Resolve a single operator token, case-insensitively.
    ///
    /// `NOT IN` spans two tokens and is resolved by the parser's segment
    /// arity rule, not here.
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        match symbol.to_lowercase().as_str() {
            "=" => Some(Operator::Equals),
            "!=" | "distinct" => Some(Operator::Distinct),
            ">" => Some(Operator::GreaterThan),
            ">=" => Some(Operator::GreaterThanOrEquals),
            "<" => Some(Operator::SmallerThan),
            "<=" => Some(Operator::SmallerThanOrEquals),
            "in" => Some(Operator::In),
            "like" => Some(Operator::Like),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Leaf evaluator: compares one field's extracted value against a literal.
///
/// Equality of evaluators is structural: (operator, field, value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEvaluator {
    field: String,
    operator: Operator,
    value: Value,
}

impl FieldEvaluator {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        let field = field.into();
        debug_assert!(!field.is_empty(), "evaluator field name must be non-empty");
        FieldEvaluator {
            field,
            operator,
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Apply the comparison to one row
    pub fn evaluate<R>(&self, row: &R, consumer: &dyn Consumer<R>) -> Result<bool> {
        let extracted = consumer.get(row, &self.field)?;
        match self.operator {
            Operator::Equals => Ok(extracted == self.value),
            Operator::Distinct => Ok(extracted != self.value),
            Operator::GreaterThan => Ok(extracted.compare(&self.value)? == Ordering::Greater),
            Operator::GreaterThanOrEquals => {
                Ok(extracted.compare(&self.value)? != Ordering::Less)
            }
            Operator::SmallerThan => Ok(extracted.compare(&self.value)? == Ordering::Less),
            Operator::SmallerThanOrEquals => {
                Ok(extracted.compare(&self.value)? != Ordering::Greater)
            }
            Operator::In => Ok(contains(&extracted, &self.value)),
            Operator::NotIn => Ok(!contains(&extracted, &self.value)),
            Operator::Like => evaluate_like(&extracted, &self.value),
        }
    }
}

impl fmt::Display for FieldEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// IN containment, polymorphic over the extracted value's runtime shape:
/// object key containment, collection membership, substring containment,
/// then scalar membership in a collection or substring in a string literal.
fn contains(extracted: &Value, literal: &Value) -> bool {
    match extracted {
        Value::Object(map) => match literal {
            Value::String(key) => map.contains_key(key),
            _ => false,
        },
        Value::Array(items) => items.contains(literal),
        Value::String(s) => match literal {
            Value::String(sub) => s.contains(sub.as_str()),
            Value::Array(items) => items.contains(extracted),
            _ => false,
        },
        scalar => match literal {
            Value::Array(items) => items.contains(scalar),
            other => scalar == other,
        },
    }
}

fn evaluate_like(extracted: &Value, literal: &Value) -> Result<bool> {
    match (extracted, literal) {
        (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
        (Value::String(s), Value::Pattern(p)) => Ok(p.matches(s)),
        _ => Err(QueryError::Type(format!(
            "LIKE requires string operands, got {} and {}",
            extracted.type_name(),
            literal.type_name()
        ))),
    }
}

/// A node in the evaluator tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorNode {
    /// Single field comparison
    Leaf(FieldEvaluator),
    /// Conjunction of children
    And(EvaluatorCollection),
    /// Disjunction of children
    Or(EvaluatorCollection),
}

impl EvaluatorNode {
    /// Evaluate the node against one row; errors propagate, they are never
    /// treated as "no match".
    pub fn evaluate<R>(&self, row: &R, consumer: &dyn Consumer<R>) -> Result<bool> {
        match self {
            EvaluatorNode::Leaf(leaf) => leaf.evaluate(row, consumer),
            EvaluatorNode::And(children) => children.evaluate_and(row, consumer),
            EvaluatorNode::Or(children) => children.evaluate_or(row, consumer),
        }
    }
}

impl fmt::Display for EvaluatorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluatorNode::Leaf(leaf) => write!(f, "{}", leaf),
            EvaluatorNode::And(children) => write!(f, "({})", children.render(" AND ")),
            EvaluatorNode::Or(children) => write!(f, "({})", children.render(" OR ")),
        }
    }
}

/// An ordered, deduplicated set of evaluator nodes.
///
/// Adding a node structurally equal to one already present is tolerated and
/// logged, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluatorCollection {
    nodes: Vec<EvaluatorNode>,
}

impl EvaluatorCollection {
    pub fn new() -> Self {
        EvaluatorCollection { nodes: Vec::new() }
    }

    /// Add a node, coalescing structural duplicates
    pub fn add(&mut self, node: EvaluatorNode) {
        if self.nodes.contains(&node) {
            warn!("duplicate evaluator ignored: {}", node);
            return;
        }
        self.nodes.push(node);
    }

    pub fn contains(&self, node: &EvaluatorNode) -> bool {
        self.nodes.contains(node)
    }

    /// Drop every node structurally equal to one of `nodes`
    pub fn remove_all(&mut self, nodes: &[EvaluatorNode]) {
        self.nodes.retain(|n| !nodes.contains(n));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvaluatorNode> {
        self.nodes.iter()
    }

    /// Conjunction: short-circuits to false on the first false child.
    /// An empty collection is true.
    pub fn evaluate_and<R>(&self, row: &R, consumer: &dyn Consumer<R>) -> Result<bool> {
        for node in &self.nodes {
            if !node.evaluate(row, consumer)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Disjunction: short-circuits to true on the first true child.
    /// An empty collection is false.
    pub fn evaluate_or<R>(&self, row: &R, consumer: &dyn Consumer<R>) -> Result<bool> {
        for node in &self.nodes {
            if node.evaluate(row, consumer)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Children joined by the given connector, for query text rendering
    pub(crate) fn render(&self, connector: &str) -> String {
        self.nodes
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(connector)
    }
}

impl IntoIterator for EvaluatorCollection {
    type Item = EvaluatorNode;
    type IntoIter = std::vec::IntoIter<EvaluatorNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}
