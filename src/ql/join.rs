//! Equi-join engine for siftql
//!
//! A build/probe join over named rows: the current left-hand rows are
//! indexed by the join's left field, the right resource is fetched with a
//! semi-join push-down evaluator, and every match merges into a new
//! left-hand set that feeds the next join in the list.

use std::collections::HashMap;

use log::debug;

use crate::core::consumer::Consumer;
use crate::core::errors::Result;
use crate::core::row::Joinable;
use crate::core::source::DataSource;
use crate::core::value::Value;
use crate::ql::ast::Join;
use crate::ql::evaluator::{EvaluatorCollection, EvaluatorNode, FieldEvaluator, Operator};

/// Execute one join step: produce the next left-hand rows.
///
/// JOIN/INNER keep matched merges only. LEFT/RIGHT currently materialize the
/// same way; their kind is carried on the Join value.
pub fn execute<R: Joinable + Clone>(
    left_rows: Vec<R>,
    join: &Join,
    source: &dyn DataSource<R>,
    consumer: &dyn Consumer<R>,
) -> Result<Vec<R>> {
    // build phase: bucket left rows by left-field value, one-to-many
    let mut index: HashMap<Value, Vec<R>> = HashMap::new();
    for row in left_rows {
        let key = consumer.get(&row, join.left_field())?;
        if key.is_null() {
            // a missing field can never satisfy an equi-join
            continue;
        }
        index.entry(key).or_default().push(row);
    }

    // semi-join push-down: only right rows whose key appears on the left
    // can possibly match
    let keys: Vec<Value> = index.keys().cloned().collect();
    let mut push_down = EvaluatorCollection::new();
    push_down.add(EvaluatorNode::Leaf(FieldEvaluator::new(
        join.right_field(),
        Operator::In,
        Value::Array(keys),
    )));
    let right_rows = source.get_resource_data(join.resource(), &push_down)?;

    // probe phase: merge every bucketed left row with each matching right row
    let mut merged_rows = Vec::new();
    for right in right_rows {
        let key = consumer.get(&right, join.right_field())?;
        if let Some(bucket) = index.get(&key) {
            for left in bucket {
                let mut merged = left.clone();
                merged.join(&right);
                merged_rows.push(merged);
            }
        }
    }
    debug!(
        "join {} produced {} row(s)",
        join,
        merged_rows.len()
    );
    Ok(merged_rows)
}
