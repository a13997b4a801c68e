//! Query model for siftql
//!
//! A Query is the immutable aggregate root produced by the compiler or by
//! QueryBuilder: resource name, evaluator tree, joins, ordering, projection
//! and limiting metadata. Once built it is never mutated, so it can be
//! evaluated concurrently from multiple threads.

use std::fmt;

use regex::Regex;
use uuid::Uuid;

use crate::core::config;
use crate::core::consumer::{Consumer, MapConsumer};
use crate::core::errors::Result;
use crate::core::row::{Joinable, JoinableMap};
use crate::core::source::{CollectionSource, DataSource};
use crate::core::value::{Pattern, Value};
use crate::ql::evaluator::{EvaluatorCollection, EvaluatorNode, FieldEvaluator, Operator};
use crate::ql::{executor, parser};

/// Kind of an equi-join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Join,
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Join => write!(f, "JOIN"),
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
            JoinType::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// Declarative equi-join: merge the right resource's rows into the current
/// left-hand rows where `left_field` equals `right_field`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    resource: String,
    left_field: String,
    right_field: String,
    kind: JoinType,
}

impl Join {
    pub fn new(
        resource: impl Into<String>,
        left_field: impl Into<String>,
        right_field: impl Into<String>,
        kind: JoinType,
    ) -> Self {
        Join {
            resource: resource.into(),
            left_field: left_field.into(),
            right_field: right_field.into(),
            kind,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn left_field(&self) -> &str {
        &self.left_field
    }

    pub fn right_field(&self) -> &str {
        &self.right_field
    }

    pub fn kind(&self) -> JoinType {
        self.kind
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ON {} = {}",
            self.kind, self.resource, self.left_field, self.right_field
        )
    }
}

/// Immutable compiled query
#[derive(Debug, Clone)]
pub struct Query {
    id: Uuid,
    resource: String,
    limit: usize,
    start: Option<u64>,
    desc: bool,
    order_fields: Vec<String>,
    return_fields: Vec<String>,
    joins: Vec<Join>,
    evaluators: EvaluatorCollection,
}

impl Query {
    /// Compile query text into a Query; all-or-nothing
    pub fn compile(text: &str) -> Result<Query> {
        parser::compile(text)
    }

    /// Start building a query against the given resource
    pub fn builder(resource: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(resource)
    }

    pub(crate) fn from_parts(
        resource: String,
        limit: usize,
        start: Option<u64>,
        desc: bool,
        order_fields: Vec<String>,
        return_fields: Vec<String>,
        joins: Vec<Join>,
        evaluators: EvaluatorCollection,
    ) -> Query {
        Query {
            id: Uuid::new_v4(),
            resource,
            limit,
            start,
            desc,
            order_fields,
            return_fields,
            joins,
            evaluators,
        }
    }

    /// Opaque unique id of this query instance
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Opaque pagination cursor; its meaning belongs to the DataSource,
    /// the engine never interprets it.
    pub fn start(&self) -> Option<u64> {
        self.start
    }

    pub fn desc(&self) -> bool {
        self.desc
    }

    pub fn order_fields(&self) -> &[String] {
        &self.order_fields
    }

    /// Projection metadata for callers; empty means all fields
    pub fn return_fields(&self) -> &[String] {
        &self.return_fields
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Root evaluator set, behaving as an implicit And
    pub fn evaluators(&self) -> &EvaluatorCollection {
        &self.evaluators
    }

    /// Run the query against a data source, extracting fields through the
    /// given consumer. Returns at most `limit` rows.
    pub fn evaluate<R: Joinable + Clone>(
        &self,
        source: &dyn DataSource<R>,
        consumer: &dyn Consumer<R>,
    ) -> Result<Vec<R>> {
        executor::evaluate(self, source, consumer)
    }

    /// Convenience: run the query against a plain in-memory collection with
    /// map-lookup field extraction
    pub fn evaluate_rows(&self, rows: Vec<JoinableMap>) -> Result<Vec<JoinableMap>> {
        let source = CollectionSource::new().with_resource(self.resource.clone(), rows);
        self.evaluate(&source, &MapConsumer)
    }

    /// Derived copy with a fresh id, minus the given root-level evaluators
    /// and order fields. Used by collaborators that push part of the
    /// filtering elsewhere and handle the remainder client-side.
    pub fn reduce(
        &self,
        evaluators_to_remove: &[EvaluatorNode],
        order_fields_to_remove: &[&str],
    ) -> Query {
        let mut reduced = self.clone();
        reduced.id = Uuid::new_v4();
        reduced.evaluators.remove_all(evaluators_to_remove);
        reduced
            .order_fields
            .retain(|f| !order_fields_to_remove.contains(&f.as_str()));
        reduced
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.return_fields.is_empty() {
            write!(f, "SELECT *")?;
        } else {
            write!(f, "SELECT {}", self.return_fields.join(", "))?;
        }
        write!(f, " FROM {}", self.resource)?;
        for join in &self.joins {
            write!(f, " {}", join)?;
        }
        if !self.evaluators.is_empty() {
            write!(f, " WHERE {}", self.evaluators.render(" AND "))?;
        }
        if !self.order_fields.is_empty() {
            write!(f, " ORDER BY {}", self.order_fields.join(", "))?;
        }
        if self.desc {
            write!(f, " DESC")?;
        }
        write!(f, " LIMIT {}", self.limit)
    }
}

/// Mutable builder producing an immutable Query.
///
/// Nested And/Or groups are built through closures, which is how control
/// returns to the enclosing collection.
#[derive(Debug)]
pub struct QueryBuilder {
    resource: String,
    limit: usize,
    start: Option<u64>,
    desc: bool,
    order_fields: Vec<String>,
    return_fields: Vec<String>,
    joins: Vec<Join>,
    root: EvaluatorCollection,
}

impl QueryBuilder {
    pub fn new(resource: impl Into<String>) -> Self {
        QueryBuilder {
            resource: resource.into(),
            limit: config::CONFIG.default_limit,
            start: None,
            desc: false,
            order_fields: Vec::new(),
            return_fields: Vec::new(),
            joins: Vec::new(),
            root: EvaluatorCollection::new(),
        }
    }

    /// Add an already-built evaluator node to the root collection
    pub fn add_evaluator(mut self, node: EvaluatorNode) -> Self {
        self.root.add(node);
        self
    }

    fn add_leaf(self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.add_evaluator(EvaluatorNode::Leaf(FieldEvaluator::new(
            field, operator, value,
        )))
    }

    pub fn equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::Equals, value)
    }

    pub fn distinct(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::Distinct, value)
    }

    pub fn greater_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::GreaterThan, value)
    }

    pub fn greater_or_equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::GreaterThanOrEquals, value)
    }

    pub fn smaller_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::SmallerThan, value)
    }

    pub fn smaller_or_equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::SmallerThanOrEquals, value)
    }

    pub fn within(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.add_leaf(field, Operator::In, Value::Array(values))
    }

    pub fn not_within(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.add_leaf(field, Operator::NotIn, Value::Array(values))
    }

    pub fn like(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_leaf(field, Operator::Like, Value::String(value.into()))
    }

    /// LIKE against a compiled regular expression, full-match semantics
    pub fn like_pattern(self, field: impl Into<String>, pattern: Regex) -> Self {
        self.add_leaf(field, Operator::Like, Value::Pattern(Pattern::new(pattern)))
    }

    /// Open a nested And group under the root
    pub fn and(mut self, build: impl FnOnce(GroupBuilder) -> GroupBuilder) -> Self {
        let group = build(GroupBuilder::new());
        self.root.add(EvaluatorNode::And(group.collection));
        self
    }

    /// Open a nested Or group under the root
    pub fn or(mut self, build: impl FnOnce(GroupBuilder) -> GroupBuilder) -> Self {
        let group = build(GroupBuilder::new());
        self.root.add(EvaluatorNode::Or(group.collection));
        self
    }

    fn add_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn join(
        self,
        resource: impl Into<String>,
        left_field: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Self {
        self.add_join(Join::new(resource, left_field, right_field, JoinType::Join))
    }

    pub fn inner_join(
        self,
        resource: impl Into<String>,
        left_field: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Self {
        self.add_join(Join::new(
            resource,
            left_field,
            right_field,
            JoinType::Inner,
        ))
    }

    pub fn left_join(
        self,
        resource: impl Into<String>,
        left_field: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Self {
        self.add_join(Join::new(resource, left_field, right_field, JoinType::Left))
    }

    pub fn right_join(
        self,
        resource: impl Into<String>,
        left_field: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Self {
        self.add_join(Join::new(
            resource,
            left_field,
            right_field,
            JoinType::Right,
        ))
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_fields.push(field.into());
        self
    }

    pub fn returns(mut self, field: impl Into<String>) -> Self {
        self.return_fields.push(field.into());
        self
    }

    pub fn descending(mut self) -> Self {
        self.desc = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    /// Finish building; the resulting Query is immutable
    pub fn build(self) -> Query {
        Query::from_parts(
            self.resource,
            self.limit,
            self.start,
            self.desc,
            self.order_fields,
            self.return_fields,
            self.joins,
            self.root,
        )
    }
}

/// Builder for a nested And/Or group
#[derive(Debug, Default)]
pub struct GroupBuilder {
    collection: EvaluatorCollection,
}

impl GroupBuilder {
    fn new() -> Self {
        GroupBuilder {
            collection: EvaluatorCollection::new(),
        }
    }

    /// Add an already-built evaluator node to this group
    pub fn add_evaluator(mut self, node: EvaluatorNode) -> Self {
        self.collection.add(node);
        self
    }

    fn add_leaf(self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.add_evaluator(EvaluatorNode::Leaf(FieldEvaluator::new(
            field, operator, value,
        )))
    }

    pub fn equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::Equals, value)
    }

    pub fn distinct(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::Distinct, value)
    }

    pub fn greater_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::GreaterThan, value)
    }

    pub fn greater_or_equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::GreaterThanOrEquals, value)
    }

    pub fn smaller_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::SmallerThan, value)
    }

    pub fn smaller_or_equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_leaf(field, Operator::SmallerThanOrEquals, value)
    }

    pub fn within(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.add_leaf(field, Operator::In, Value::Array(values))
    }

    pub fn not_within(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.add_leaf(field, Operator::NotIn, Value::Array(values))
    }

    pub fn like(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_leaf(field, Operator::Like, Value::String(value.into()))
    }

    pub fn like_pattern(self, field: impl Into<String>, pattern: Regex) -> Self {
        self.add_leaf(field, Operator::Like, Value::Pattern(Pattern::new(pattern)))
    }

    /// Open a nested And group under this group
    pub fn and(mut self, build: impl FnOnce(GroupBuilder) -> GroupBuilder) -> Self {
        let group = build(GroupBuilder::new());
        self.collection.add(EvaluatorNode::And(group.collection));
        self
    }

    /// Open a nested Or group under this group
    pub fn or(mut self, build: impl FnOnce(GroupBuilder) -> GroupBuilder) -> Self {
        let group = build(GroupBuilder::new());
        self.collection.add(EvaluatorNode::Or(group.collection));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_immutable_query() {
        let query = Query::builder("character")
            .equals("race", "dwarf")
            .greater_than("weight", 40)
            .order_by("name")
            .descending()
            .limit(10)
            .build();

        assert_eq!(query.resource(), "character");
        assert_eq!(query.evaluators().len(), 2);
        assert_eq!(query.order_fields(), &["name".to_string()]);
        assert!(query.desc());
        assert_eq!(query.limit(), 10);
    }

    #[test]
    fn test_builder_default_limit_from_config() {
        let query = Query::builder("character").build();
        assert_eq!(query.limit(), config::CONFIG.default_limit);
    }

    #[test]
    fn test_nested_groups() {
        let query = Query::builder("character")
            .equals("race", "dwarf")
            .or(|g| g.equals("name", "gimli").equals("name", "gloin"))
            .build();

        assert_eq!(query.evaluators().len(), 2);
        let nested = query
            .evaluators()
            .iter()
            .find(|n| matches!(n, EvaluatorNode::Or(_)));
        assert!(nested.is_some());
    }

    #[test]
    fn test_reduce_filters_root_evaluators_and_order_fields() {
        let query = Query::builder("character")
            .equals("race", "dwarf")
            .greater_than("weight", 40)
            .order_by("name")
            .order_by("weight")
            .build();

        let removed = EvaluatorNode::Leaf(FieldEvaluator::new("race", Operator::Equals, "dwarf"));
        let reduced = query.reduce(&[removed], &["name"]);

        assert_ne!(reduced.id(), query.id());
        assert_eq!(reduced.evaluators().len(), 1);
        assert_eq!(reduced.order_fields(), &["weight".to_string()]);
        // the original is untouched
        assert_eq!(query.evaluators().len(), 2);
    }

    #[test]
    fn test_display_renders_query_text() {
        let query = Query::builder("character")
            .equals("race", "dwarf")
            .join("weapon", "id", "owner")
            .order_by("name")
            .limit(5)
            .build();

        let text = query.to_string();
        assert_eq!(
            text,
            "SELECT * FROM character JOIN weapon ON id = owner \
             WHERE race = 'dwarf' ORDER BY name LIMIT 5"
        );
    }
}
