//! Error types for siftql
//!
//! This module defines the various error types that can occur
//! while compiling or evaluating a query.

use thiserror::Error;

/// Errors that can occur during query compilation or evaluation
#[derive(Error, Debug)]
pub enum QueryError {
    /// The query text does not match the language; compilation is
    /// all-or-nothing, no partial query is ever produced.
    #[error("compile error: {0}")]
    Compile(String),

    /// An extracted value and a literal are not mutually comparable.
    /// Propagated out of evaluation so a configuration mistake cannot
    /// masquerade as an empty result.
    #[error("type error: {0}")]
    Type(String),

    /// A consumer has no accessor registered for a requested field.
    #[error("field access error: {0}")]
    FieldAccess(String),

    /// The data source cannot resolve a named resource.
    #[error("cannot resolve resource: {0}")]
    JoinResolution(String),

    /// A data source implementation failed while fetching rows.
    #[error("data source error: {0}")]
    Source(String),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
