//! Local predicate evaluation
//!
//! Evaluates condition trees against decoded records. Used to apply the
//! residual conditions the store dialect could not express.
//!
//! Attributes are multi-valued: a comparison matches when any value of the
//! attribute matches. Absent and null attributes have no values.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Map, Value};

use super::ast::{Comparison, ComparisonOp, Condition, ConditionValue, Connective};

/// Evaluates conditions against decoded records
pub struct ConditionMatcher;

impl ConditionMatcher {
    /// Checks if a record satisfies a condition.
    ///
    /// Raw templates always match locally; they were applied by the store.
    pub fn matches(record: &Map<String, Value>, condition: &Condition) -> bool {
        match condition {
            Condition::Comparison(c) => Self::matches_comparison(record, c),
            Condition::Operation(op) => match op.connective {
                Connective::And => op.operands.iter().all(|o| Self::matches(record, o)),
                Connective::Or => op.operands.iter().any(|o| Self::matches(record, o)),
                Connective::Not => match op.operands.as_slice() {
                    // Negated empty membership is vacuous, as the compiler drops it.
                    [Condition::Comparison(c)]
                        if c.op == ComparisonOp::In && c.value.is_empty_set() =>
                    {
                        true
                    }
                    operands => !operands.iter().all(|o| Self::matches(record, o)),
                },
            },
            Condition::Raw(_) => true,
        }
    }

    fn matches_comparison(record: &Map<String, Value>, comparison: &Comparison) -> bool {
        let values = field_values(record, &comparison.field);

        match (comparison.op, &comparison.value) {
            (ComparisonOp::Eq, ConditionValue::Null) => values.is_empty(),
            (ComparisonOp::Eq, ConditionValue::Scalar(expected)) => values
                .iter()
                .any(|v| compare_values(v, expected) == Ordering::Equal),
            (ComparisonOp::Gt, ConditionValue::Scalar(bound)) => values
                .iter()
                .any(|v| compare_values(v, bound) == Ordering::Greater),
            (ComparisonOp::Gte, ConditionValue::Scalar(bound)) => values
                .iter()
                .any(|v| compare_values(v, bound) != Ordering::Less),
            (ComparisonOp::Lt, ConditionValue::Scalar(bound)) => values
                .iter()
                .any(|v| compare_values(v, bound) == Ordering::Less),
            (ComparisonOp::Lte, ConditionValue::Scalar(bound)) => values
                .iter()
                .any(|v| compare_values(v, bound) != Ordering::Greater),
            (ComparisonOp::Like, ConditionValue::Scalar(pattern)) => {
                match like_pattern(&value_text(pattern)) {
                    Some(regex) => values.iter().any(|v| regex.is_match(&value_text(v))),
                    None => false,
                }
            }
            // An empty membership set is treated as "attribute absent",
            // mirroring how the compiler renders it.
            (ComparisonOp::In, ConditionValue::Set(set)) if set.is_empty() => values.is_empty(),
            (ComparisonOp::In, ConditionValue::Set(set)) => values.iter().any(|v| {
                set.iter()
                    .any(|member| compare_values(v, member) == Ordering::Equal)
            }),
            (
                ComparisonOp::In,
                ConditionValue::Range {
                    start,
                    end,
                    inclusive,
                },
            ) => values.iter().any(|v| {
                let above_start = compare_values(v, start) != Ordering::Less;
                let below_end = match compare_values(v, end) {
                    Ordering::Less => true,
                    Ordering::Equal => *inclusive,
                    Ordering::Greater => false,
                };
                above_start && below_end
            }),
            (ComparisonOp::Regexp, ConditionValue::Pattern(pattern)) => {
                values.iter().any(|v| pattern.is_match(&value_text(v)))
            }
            _ => false,
        }
    }
}

/// Returns the non-null values of a record attribute
fn field_values<'a>(record: &'a Map<String, Value>, field: &str) -> Vec<&'a Value> {
    match record.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
        Some(other) => vec![other],
    }
}

/// Returns the textual form of a value as the store would hold it
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Compares two values.
///
/// Numeric when at least one side is a JSON number and both sides read as
/// numbers; otherwise lexicographic on the textual forms.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    if a.is_number() || b.is_number() {
        if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
            return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        }
    }
    value_text(a).cmp(&value_text(b))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Translates a `LIKE` pattern into an anchored regular expression.
///
/// `%` matches any run of characters and `_` matches exactly one.
pub fn like_pattern(pattern: &str) -> Option<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for c in pattern.chars() {
        match c {
            '%' => source.push_str("(?s:.*)"),
            '_' => source.push_str("(?s:.)"),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).ok()
}
