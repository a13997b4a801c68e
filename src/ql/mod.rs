//! Query Language for siftql
//!
//! This module provides the SQL-like query language: the compiler turning
//! text into a Query and the engine evaluating it against a data source.

pub mod ast;
pub mod evaluator;
pub mod executor;
pub mod join;
pub mod parser;

pub use ast::{GroupBuilder, Join, JoinType, Query, QueryBuilder};
pub use evaluator::{EvaluatorCollection, EvaluatorNode, FieldEvaluator, Operator};

use crate::core::errors::Result;

/// Compile query text into a Query
pub fn compile(text: &str) -> Result<Query> {
    parser::compile(text)
}
