//! Adapter subsystem
//!
//! The public entry point: [`SdbAdapter`] runs model-level operations
//! against one store domain.
//!
//! ```ignore
//! use sdb_adapter::adapter::{AdapterConfig, Query, SdbAdapter};
//! use sdb_adapter::condition::Condition;
//!
//! let config = AdapterConfig::from_file("sdb.json")?;
//! let mut adapter = SdbAdapter::new(config, Box::new(client))?;
//! adapter.create(&posts, &mut rows)?;
//! let recent = adapter.read(&Query::new(posts).filter(Condition::gt("score", 3)))?;
//! ```

#[allow(clippy::module_inception)]
mod adapter;
mod config;
mod errors;
mod query;
mod sorter;

pub use adapter::SdbAdapter;
pub use config::AdapterConfig;
pub use errors::{AdapterError, AdapterResult, ConfigError};
pub use query::{Aggregate, Query};
pub use sorter::RecordSorter;
