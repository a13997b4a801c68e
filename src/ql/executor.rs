//! Evaluation engine for siftql
//!
//! Runs a compiled Query against a data source: fetch candidates (through
//! the join pipeline when joins exist), re-evaluate the full evaluator tree
//! per row, order, and cap at the query limit.

use std::cmp::Ordering;

use log::debug;

use crate::core::consumer::Consumer;
use crate::core::errors::Result;
use crate::core::row::Joinable;
use crate::core::source::DataSource;
use crate::ql::ast::Query;
use crate::ql::join;

/// Evaluate the query, returning at most `query.limit()` rows.
///
/// The scan stops as soon as `limit` rows have been accepted, in source
/// order. With a non-empty ORDER BY and a source larger than the limit this
/// returns the first accepted rows sorted, not the true top-limit; that
/// behavior is deliberate and pinned by tests.
pub fn evaluate<R: Joinable + Clone>(
    query: &Query,
    source: &dyn DataSource<R>,
    consumer: &dyn Consumer<R>,
) -> Result<Vec<R>> {
    // candidate rows; the data source receives the root evaluators for
    // optional push-down, every candidate is re-checked below anyway
    let mut candidates = source.get_resource_data(query.resource(), query.evaluators())?;
    for step in query.joins() {
        candidates = join::execute(candidates, step, source, consumer)?;
    }

    let limit = query.limit();
    if limit == 0 {
        return Ok(Vec::new());
    }
    let results = if query.order_fields().is_empty() {
        let mut results = Vec::new();
        for row in candidates {
            if query.evaluators().evaluate_and(&row, consumer)? {
                results.push(row);
                if results.len() >= limit {
                    break;
                }
            }
        }
        results
    } else {
        // ordered container: rows are tagged with their acceptance sequence,
        // the identity tie-break, and inserted in sort position
        let mut ordered: Vec<(R, usize)> = Vec::new();
        let mut sequence = 0;
        for row in candidates {
            if query.evaluators().evaluate_and(&row, consumer)? {
                let entry = (row, sequence);
                sequence += 1;
                let position = sort_position(&ordered, &entry, query, consumer)?;
                ordered.insert(position, entry);
                if ordered.len() >= limit {
                    break;
                }
            }
        }
        ordered.into_iter().map(|(row, _)| row).collect()
    };

    debug!(
        "query {} returned {} row(s) (limit {})",
        query.id(),
        results.len(),
        limit
    );
    Ok(results)
}

/// Binary search with a fallible comparator
fn sort_position<R>(
    ordered: &[(R, usize)],
    entry: &(R, usize),
    query: &Query,
    consumer: &dyn Consumer<R>,
) -> Result<usize> {
    let mut low = 0;
    let mut high = ordered.len();
    while low < high {
        let mid = (low + high) / 2;
        if compare_rows(entry, &ordered[mid], query, consumer)? == Ordering::Less {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    Ok(low)
}

/// Compare two accepted rows by each order field in turn; the first field
/// dominates and ties move to the next. The final tie-break is the
/// acceptance sequence. The whole ordering is negated when `desc` is set.
fn compare_rows<R>(
    a: &(R, usize),
    b: &(R, usize),
    query: &Query,
    consumer: &dyn Consumer<R>,
) -> Result<Ordering> {
    let mut ordering = Ordering::Equal;
    for field in query.order_fields() {
        let left = consumer.get(&a.0, field)?;
        let right = consumer.get(&b.0, field)?;
        ordering = left.compare(&right)?;
        if ordering != Ordering::Equal {
            break;
        }
    }
    if ordering == Ordering::Equal {
        ordering = a.1.cmp(&b.1);
    }
    Ok(if query.desc() {
        ordering.reverse()
    } else {
        ordering
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consumer::{FieldConsumer, MapConsumer};
    use crate::core::errors::QueryError;
    use crate::core::row::JoinableMap;
    use crate::core::source::CollectionSource;
    use crate::core::value::Value;
    use crate::ql::ast::Query;
    use serde_json::json;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn characters() -> Vec<JoinableMap> {
        [
            json!({"name": "aragorn", "weight": 90}),
            json!({"name": "gimli", "weight": 80}),
            json!({"name": "legolas", "weight": 65}),
            json!({"name": "frodo", "weight": 35}),
            json!({"name": "gandalf", "weight": 70}),
            json!({"name": "boromir", "weight": 100}),
        ]
        .into_iter()
        .map(JoinableMap::from)
        .collect()
    }

    fn names(rows: &[JoinableMap]) -> Vec<String> {
        rows.iter()
            .map(|r| match r.get("name") {
                Some(Value::String(s)) => s.clone(),
                other => panic!("missing name: {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_where_range_filter() {
        init_logging();
        let query =
            Query::compile("SELECT * FROM character WHERE weight > 40 AND weight < 100").unwrap();
        let rows = query.evaluate_rows(characters()).unwrap();

        assert_eq!(names(&rows), vec!["aragorn", "gimli", "legolas", "gandalf"]);
    }

    #[test]
    fn test_empty_where_matches_every_row() {
        let query = Query::compile("SELECT * FROM character").unwrap();
        let rows = query.evaluate_rows(characters()).unwrap();
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_order_by_descending() {
        let query = Query::compile("SELECT * FROM character ORDER BY name DESC").unwrap();
        let rows = query.evaluate_rows(characters()).unwrap();

        assert_eq!(
            names(&rows),
            vec!["legolas", "gimli", "gandalf", "frodo", "boromir", "aragorn"]
        );
    }

    #[test]
    fn test_order_by_secondary_field_breaks_ties() {
        let rows = vec![
            JoinableMap::from(json!({"race": "dwarf", "name": "gloin"})),
            JoinableMap::from(json!({"race": "dwarf", "name": "gimli"})),
            JoinableMap::from(json!({"race": "elf", "name": "legolas"})),
        ];
        let query = Query::compile("SELECT * FROM character ORDER BY race, name").unwrap();
        let sorted = query.evaluate_rows(rows).unwrap();

        assert_eq!(names(&sorted), vec!["gimli", "gloin", "legolas"]);
    }

    #[test]
    fn test_limit_without_order_keeps_source_order() {
        let query = Query::compile("SELECT * FROM character LIMIT 2").unwrap();
        let rows = query.evaluate_rows(characters()).unwrap();

        assert_eq!(names(&rows), vec!["aragorn", "gimli"]);
    }

    #[test]
    fn test_result_never_exceeds_limit() {
        for limit in 1..=6 {
            let query =
                Query::compile(&format!("SELECT * FROM character LIMIT {}", limit)).unwrap();
            let rows = query.evaluate_rows(characters()).unwrap();
            assert!(rows.len() <= limit);
        }
    }

    #[test]
    fn test_order_by_limit_keeps_first_accepted() {
        // the scan stops after `limit` accepted rows in source order, so the
        // true top-2 by name ("aragorn", "boromir") is not what comes back
        let query = Query::compile("SELECT * FROM character ORDER BY name LIMIT 2").unwrap();
        let rows = query.evaluate_rows(characters()).unwrap();

        assert_eq!(names(&rows), vec!["aragorn", "gimli"]);
    }

    #[test]
    fn test_join_end_to_end() {
        let source = CollectionSource::new()
            .with_resource(
                "a",
                vec![
                    JoinableMap::from(json!({"id": 1})),
                    JoinableMap::from(json!({"id": 2})),
                ],
            )
            .with_resource("b", vec![JoinableMap::from(json!({"aid": 1, "x": 9}))]);

        let query = Query::compile("SELECT * FROM a JOIN b ON a.id = b.aid").unwrap();
        let rows = query.evaluate(&source, &MapConsumer).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Integer(1)));
        assert_eq!(rows[0].get("aid"), Some(&Value::Integer(1)));
        assert_eq!(rows[0].get("x"), Some(&Value::Integer(9)));
    }

    #[test]
    fn test_in_filter() {
        let rows = vec![
            JoinableMap::from(json!({"f": 1})),
            JoinableMap::from(json!({"f": 4})),
        ];
        let query = Query::compile("SELECT * FROM r WHERE f IN (1, 2, 3)").unwrap();
        let matched = query.evaluate_rows(rows).unwrap();

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].get("f"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_type_error_propagates() {
        let rows = vec![JoinableMap::from(json!({"weight": "heavy"}))];
        let query = Query::compile("SELECT * FROM r WHERE weight > 40").unwrap();

        let err = query.evaluate_rows(rows).unwrap_err();
        assert!(matches!(err, QueryError::Type(_)));
    }

    #[test]
    fn test_client_side_reevaluation_guards_partial_push_down() {
        // the in-memory source ignores push-down entirely; the engine must
        // still filter out non-matching rows
        let query = Query::compile("SELECT * FROM character WHERE weight = 35").unwrap();
        let rows = query.evaluate_rows(characters()).unwrap();
        assert_eq!(names(&rows), vec!["frodo"]);
    }

    #[test]
    fn test_evaluate_struct_rows_with_field_consumer() {
        #[derive(Clone)]
        struct Character {
            name: &'static str,
            weight: i64,
        }

        impl crate::core::row::Joinable for Character {
            fn join(&mut self, _other: &Self) {}
        }

        let consumer = FieldConsumer::new()
            .field("name", |c: &Character| c.name.into())
            .field("weight", |c: &Character| c.weight.into());
        let source = CollectionSource::new().with_resource(
            "character",
            vec![
                Character {
                    name: "gimli",
                    weight: 80,
                },
                Character {
                    name: "frodo",
                    weight: 35,
                },
            ],
        );

        let query = Query::compile("SELECT * FROM character WHERE weight > 40").unwrap();
        let rows = query.evaluate(&source, &consumer).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "gimli");
    }
}
