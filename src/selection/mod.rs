//! Selection subsystem
//!
//! Builds full select statements from condition trees and pages through
//! their results.

mod engine;
mod statement;

pub use engine::{Records, SelectionEngine, SelectionError};
pub use statement::{CompiledSelection, SortDirection, SortSpec};
