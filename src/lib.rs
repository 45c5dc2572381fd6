//! sdb-adapter - A record adapter for SimpleDB-style attribute stores
//!
//! Layers, bottom up:
//! - store: the client seam, an in-memory emulator and a null client
//! - condition: predicate trees and their local evaluation
//! - where_expr: compiles predicate trees into the store's select dialect
//! - record: models and the attribute codec
//! - selection: paged select execution
//! - consistency: read-after-write via consistency tokens
//! - adapter: create, read, update, delete and count over all of the above

pub mod adapter;
pub mod condition;
pub mod consistency;
pub mod observability;
pub mod record;
pub mod selection;
pub mod store;
pub mod where_expr;

pub use adapter::{AdapterConfig, AdapterError, Aggregate, Query, SdbAdapter};
pub use condition::Condition;
pub use record::{FieldKind, Model};
