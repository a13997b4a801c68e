//! DataSource strategies for siftql
//!
//! A DataSource supplies a named resource's raw rows. The evaluators handed
//! to it are advisory push-down filtering: a source may apply them to avoid
//! materializing rows that cannot match, or ignore them entirely; the
//! engine re-filters every candidate client-side.

use std::collections::HashMap;

use crate::core::errors::{QueryError, Result};
use crate::ql::evaluator::EvaluatorCollection;

/// Strategy supplying a named resource's raw rows
pub trait DataSource<R> {
    /// Fetch the rows of `resource`, optionally pre-filtered by `evaluators`
    fn get_resource_data(
        &self,
        resource: &str,
        evaluators: &EvaluatorCollection,
    ) -> Result<Vec<R>>;
}

/// In-memory data source keyed by resource name.
///
/// Ignores push-down evaluators; the engine's client-side pass does all the
/// filtering.
#[derive(Debug, Clone, Default)]
pub struct CollectionSource<R> {
    resources: HashMap<String, Vec<R>>,
}

impl<R> CollectionSource<R> {
    pub fn new() -> Self {
        CollectionSource {
            resources: HashMap::new(),
        }
    }

    /// Register a named resource's rows
    pub fn with_resource(mut self, name: impl Into<String>, rows: Vec<R>) -> Self {
        self.resources.insert(name.into(), rows);
        self
    }
}

impl<R: Clone> DataSource<R> for CollectionSource<R> {
    fn get_resource_data(
        &self,
        resource: &str,
        _evaluators: &EvaluatorCollection,
    ) -> Result<Vec<R>> {
        self.resources
            .get(resource)
            .cloned()
            .ok_or_else(|| QueryError::JoinResolution(resource.to_string()))
    }
}
