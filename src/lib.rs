//! siftql: an embedded SQL-like query engine
//!
//! This crate lets arbitrary in-process data collections (generic maps,
//! native structs, or rows fetched from remote resources) be queried with a
//! compact SQL-like syntax, producing filtered, sorted, paginated and
//! optionally joined result sets without an external database engine.
//!
//! ```
//! use siftql::{JoinableMap, Query};
//! use serde_json::json;
//!
//! let rows = vec![
//!     JoinableMap::from(json!({"name": "gimli", "weight": 80})),
//!     JoinableMap::from(json!({"name": "frodo", "weight": 35})),
//! ];
//!
//! let query = Query::compile("SELECT * FROM character WHERE weight > 40").unwrap();
//! let matched = query.evaluate_rows(rows).unwrap();
//! assert_eq!(matched.len(), 1);
//! ```

pub mod core;
pub mod ql;

pub use crate::core::config::QueryConfig;
pub use crate::core::consumer::{Consumer, FieldConsumer, MapConsumer};
pub use crate::core::errors::{QueryError, Result};
pub use crate::core::row::{Joinable, JoinableMap};
pub use crate::core::source::{CollectionSource, DataSource};
pub use crate::core::value::{Pattern, Value};
pub use crate::ql::ast::{GroupBuilder, Join, JoinType, Query, QueryBuilder};
pub use crate::ql::evaluator::{EvaluatorCollection, EvaluatorNode, FieldEvaluator, Operator};
pub use crate::ql::compile;
