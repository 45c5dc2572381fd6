//! Condition AST
//!
//! The structured predicate tree produced by the query layer. Leaves are
//! comparisons, inner nodes are boolean operations, and raw templates are an
//! escape hatch for literal dialect text.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::Value;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// Equality: field = value
    Eq,
    /// Greater than: field > value
    Gt,
    /// Greater than or equal: field >= value
    Gte,
    /// Less than: field < value
    Lt,
    /// Less than or equal: field <= value
    Lte,
    /// Pattern match with `%` and `_` wildcards
    Like,
    /// Set or range membership
    In,
    /// Regular expression match
    Regexp,
}

impl ComparisonOp {
    /// Returns the operator name for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Gte => "gte",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Lte => "lte",
            ComparisonOp::Like => "like",
            ComparisonOp::In => "in",
            ComparisonOp::Regexp => "regexp",
        }
    }

    /// Returns true if this operator is an equality test
    pub fn is_equality(&self) -> bool {
        matches!(self, ComparisonOp::Eq)
    }
}

/// A compiled regular expression used as a comparison value.
///
/// Equality is by source pattern.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Pattern)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Pattern(regex)
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// Absence of a value
    Null,
    /// A single value
    Scalar(Value),
    /// Membership set
    Set(Vec<Value>),
    /// Ordered range; `inclusive` controls the upper bound
    Range {
        start: Value,
        end: Value,
        inclusive: bool,
    },
    /// Regular expression
    Pattern(Pattern),
}

impl ConditionValue {
    /// Wraps a JSON value, mapping `null` to [`ConditionValue::Null`]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => ConditionValue::Null,
            other => ConditionValue::Scalar(other),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConditionValue::Null)
    }

    /// Returns true for an empty membership set
    pub fn is_empty_set(&self) -> bool {
        matches!(self, ConditionValue::Set(values) if values.is_empty())
    }

    /// Returns true for a range that excludes its upper bound
    pub fn is_exclusive_range(&self) -> bool {
        matches!(self, ConditionValue::Range { inclusive: false, .. })
    }
}

/// A leaf comparison: `field <op> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: ComparisonOp,
    pub field: String,
    pub value: ConditionValue,
}

impl Comparison {
    pub fn new(op: ComparisonOp, field: impl Into<String>, value: ConditionValue) -> Self {
        Self {
            op,
            field: field.into(),
            value,
        }
    }

    /// Returns true if the store dialect cannot express this comparison.
    ///
    /// Exclusive ranges and regular expressions must be evaluated locally.
    pub fn is_unsupported(&self) -> bool {
        match self.op {
            ComparisonOp::Regexp => true,
            ComparisonOp::In => self.value.is_exclusive_range(),
            _ => false,
        }
    }
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
    Not,
}

impl Connective {
    /// Returns the dialect keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
            Connective::Not => "NOT",
        }
    }
}

/// A boolean operation over child conditions
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub connective: Connective,
    pub operands: Vec<Condition>,
}

impl Operation {
    pub fn new(connective: Connective, operands: Vec<Condition>) -> Self {
        Self {
            connective,
            operands,
        }
    }
}

/// Placeholder values for a raw template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArgs {
    /// Filled into `?` placeholders in order
    Positional(Vec<Value>),
    /// Filled into `:name` placeholders by key
    Named(BTreeMap<String, Value>),
}

/// Literal dialect text with placeholders.
///
/// The template text is emitted verbatim; only placeholder values are quoted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTemplate {
    pub text: String,
    pub args: TemplateArgs,
}

/// A node of the condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison(Comparison),
    Operation(Operation),
    Raw(RawTemplate),
}

impl Condition {
    fn compare(op: ComparisonOp, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Comparison(Comparison::new(
            op,
            field,
            ConditionValue::from_json(value.into()),
        ))
    }

    /// `field = value`; a null value means "attribute absent"
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(ComparisonOp::Eq, field, value)
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::eq(field, Value::Null)
    }

    /// `field IS NOT NULL`
    pub fn not_null(field: impl Into<String>) -> Self {
        Self::not(Self::is_null(field))
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::not(Self::eq(field, value))
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(ComparisonOp::Gt, field, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(ComparisonOp::Gte, field, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(ComparisonOp::Lt, field, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(ComparisonOp::Lte, field, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(ComparisonOp::Like, field, pattern.into())
    }

    /// Set membership
    pub fn in_set<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Condition::Comparison(Comparison::new(
            ComparisonOp::In,
            field,
            ConditionValue::Set(values.into_iter().map(Into::into).collect()),
        ))
    }

    /// Inclusive range membership (`start..=end`)
    pub fn in_range(
        field: impl Into<String>,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        Condition::Comparison(Comparison::new(
            ComparisonOp::In,
            field,
            ConditionValue::Range {
                start: start.into(),
                end: end.into(),
                inclusive: true,
            },
        ))
    }

    /// Exclusive range membership (`start..end`)
    pub fn in_exclusive_range(
        field: impl Into<String>,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        Condition::Comparison(Comparison::new(
            ComparisonOp::In,
            field,
            ConditionValue::Range {
                start: start.into(),
                end: end.into(),
                inclusive: false,
            },
        ))
    }

    pub fn regexp(field: impl Into<String>, pattern: Pattern) -> Self {
        Condition::Comparison(Comparison::new(
            ComparisonOp::Regexp,
            field,
            ConditionValue::Pattern(pattern),
        ))
    }

    pub fn and(operands: Vec<Condition>) -> Self {
        Condition::Operation(Operation::new(Connective::And, operands))
    }

    pub fn or(operands: Vec<Condition>) -> Self {
        Condition::Operation(Operation::new(Connective::Or, operands))
    }

    pub fn not(operand: Condition) -> Self {
        Condition::Operation(Operation::new(Connective::Not, vec![operand]))
    }

    /// The empty conjunction, which every record satisfies
    pub fn always() -> Self {
        Self::and(Vec::new())
    }

    /// Raw template with positional `?` placeholders
    pub fn raw(text: impl Into<String>, args: Vec<Value>) -> Self {
        Condition::Raw(RawTemplate {
            text: text.into(),
            args: TemplateArgs::Positional(args),
        })
    }

    /// Raw template with `:name` placeholders
    pub fn raw_named(text: impl Into<String>, args: BTreeMap<String, Value>) -> Self {
        Condition::Raw(RawTemplate {
            text: text.into(),
            args: TemplateArgs::Named(args),
        })
    }

    /// Returns true for the empty conjunction
    pub fn is_vacuous(&self) -> bool {
        matches!(
            self,
            Condition::Operation(Operation { connective: Connective::And, operands })
                if operands.is_empty()
        )
    }

    /// Conjoins `other` onto this condition, flattening top-level conjunctions
    pub fn and_with(self, other: Condition) -> Condition {
        let mut operands = self.into_conjuncts();
        operands.extend(other.into_conjuncts());
        Condition::and(operands)
    }

    /// Splits a top-level conjunction into its operands
    pub fn into_conjuncts(self) -> Vec<Condition> {
        match self {
            Condition::Operation(Operation {
                connective: Connective::And,
                operands,
            }) => operands,
            other => vec![other],
        }
    }

    /// Visits every comparison in the tree
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            Condition::Comparison(c) => out.push(c),
            Condition::Operation(op) => {
                for operand in &op.operands {
                    operand.collect_comparisons(out);
                }
            }
            Condition::Raw(_) => {}
        }
    }

    /// Returns true if the tree uses anything other than plain equality
    /// conjunctions: negation, disjunction, ordering, patterns, raw text.
    pub fn is_equality_only(&self) -> bool {
        match self {
            Condition::Comparison(c) => c.op.is_equality(),
            Condition::Operation(op) => {
                op.connective == Connective::And
                    && op.operands.iter().all(Condition::is_equality_only)
            }
            Condition::Raw(_) => false,
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Null => write!(f, "nil"),
            ConditionValue::Scalar(v) => write!(f, "{}", display_value(v)),
            ConditionValue::Set(values) => {
                let items: Vec<String> = values.iter().map(display_value).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ConditionValue::Range {
                start,
                end,
                inclusive,
            } => {
                let dots = if *inclusive { ".." } else { "..." };
                write!(f, "{}{}{}", display_value(start), dots, display_value(end))
            }
            ConditionValue::Pattern(p) => write!(f, "/{}/", p.as_str()),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Comparison(c) => write!(f, "{} {} {}", c.field, c.op.as_str(), c.value),
            Condition::Operation(op) => {
                let parts: Vec<String> = op.operands.iter().map(|o| o.to_string()).collect();
                write!(f, "{}({})", op.connective.keyword().to_lowercase(), parts.join(", "))
            }
            Condition::Raw(raw) => write!(f, "[{:?}]", raw.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eq_null_becomes_null_value() {
        let cond = Condition::eq("title", Value::Null);
        match cond {
            Condition::Comparison(c) => assert!(c.value.is_null()),
            _ => panic!("expected comparison"),
        }
    }

    #[test]
    fn test_unsupported_comparisons() {
        let regex = Comparison::new(
            ComparisonOp::Regexp,
            "title",
            ConditionValue::Pattern(Pattern::new("foo").unwrap()),
        );
        assert!(regex.is_unsupported());

        let exclusive = Comparison::new(
            ComparisonOp::In,
            "title",
            ConditionValue::Range {
                start: json!("A"),
                end: json!("Z"),
                inclusive: false,
            },
        );
        assert!(exclusive.is_unsupported());

        let inclusive = Comparison::new(
            ComparisonOp::In,
            "title",
            ConditionValue::Range {
                start: json!("A"),
                end: json!("Z"),
                inclusive: true,
            },
        );
        assert!(!inclusive.is_unsupported());
    }

    #[test]
    fn test_vacuous_and() {
        assert!(Condition::always().is_vacuous());
        assert!(!Condition::or(Vec::new()).is_vacuous());
        assert!(!Condition::eq("a", "b").is_vacuous());
    }

    #[test]
    fn test_and_with_flattens() {
        let combined = Condition::and(vec![Condition::eq("a", "1")])
            .and_with(Condition::and(vec![Condition::eq("b", "2"), Condition::eq("c", "3")]));
        assert_eq!(combined.into_conjuncts().len(), 3);
    }

    #[test]
    fn test_equality_only() {
        let eq_only = Condition::and(vec![Condition::eq("a", "1"), Condition::eq("b", 2)]);
        assert!(eq_only.is_equality_only());

        assert!(!Condition::gt("a", 1).is_equality_only());
        assert!(!Condition::ne("a", 1).is_equality_only());
        assert!(!Condition::or(vec![Condition::eq("a", "1")]).is_equality_only());
    }

    #[test]
    fn test_pattern_equality_by_source() {
        assert_eq!(Pattern::new("fo+").unwrap(), Pattern::new("fo+").unwrap());
        assert_ne!(Pattern::new("fo+").unwrap(), Pattern::new("fo*").unwrap());
    }

    #[test]
    fn test_display() {
        let cond = Condition::and(vec![
            Condition::eq("title", "FOO"),
            Condition::in_exclusive_range("age", 1, 5),
        ]);
        assert_eq!(cond.to_string(), "and(title eq \"FOO\", age in 1...5)");
    }
}
