//! Runtime configuration for siftql

use lazy_static::lazy_static;

/// Environment variable overriding the default result limit
pub const DEFAULT_LIMIT_ENV: &str = "SIFTQL_DEFAULT_LIMIT";

const DEFAULT_LIMIT: usize = 1000;

/// Engine-wide configuration knobs
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Result limit applied to queries that do not set one
    pub default_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl QueryConfig {
    /// Build a configuration from the process environment
    pub fn from_env() -> Self {
        let default_limit = std::env::var(DEFAULT_LIMIT_ENV)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_LIMIT);
        QueryConfig { default_limit }
    }
}

lazy_static! {
    /// Configuration read once at first use
    pub static ref CONFIG: QueryConfig = QueryConfig::from_env();
}
