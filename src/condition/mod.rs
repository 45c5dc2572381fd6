//! Condition subsystem
//!
//! The predicate tree shared by the where-expression compiler, the selection
//! engine and the adapter's local post-filter.
//!
//! # Node kinds
//!
//! - Comparison: `field <op> value` leaves
//! - Operation: `and` / `or` / `not` over child nodes
//! - Raw template: literal dialect text with quoted placeholders

mod ast;
mod matcher;

pub use ast::{
    Comparison, ComparisonOp, Condition, ConditionValue, Connective, Operation, Pattern,
    RawTemplate, TemplateArgs,
};
pub use matcher::{compare_values, like_pattern, value_text, ConditionMatcher};
