//! Where-expression subsystem
//!
//! Compiles condition trees into the store's WHERE dialect.
//!
//! # Outputs
//!
//! - `text`: the dialect filter, deterministic for a given tree
//! - `residual`: the clauses the dialect cannot express, always a valid
//!   predicate (the empty `and` when nothing is left over)

mod compiler;
mod errors;
mod quoting;
mod template;

pub use compiler::{compile, CompiledWhere};
pub use errors::{CompileError, CompileErrorCode, CompileResult};
pub use quoting::{quote_json, quote_name, quote_value, ITEM_NAME};
