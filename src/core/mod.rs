pub mod config;
pub mod consumer;
pub mod errors;
pub mod row;
pub mod source;
pub mod value;

pub use config::QueryConfig;
pub use consumer::{Consumer, FieldConsumer, MapConsumer};
pub use errors::{QueryError, Result};
pub use row::{Joinable, JoinableMap};
pub use source::{CollectionSource, DataSource};
pub use value::{Pattern, Value};
