//! Where-expression compiler
//!
//! Renders a condition tree into the store's WHERE dialect and collects the
//! clauses the dialect cannot express into a residual tree.
//!
//! Rendering rules:
//! - `eq` → `=`, or `IS` against null; `not(eq)` folds into `!=` / `IS NOT`
//! - `in` over a set → `IN (...)`, over an inclusive range → `BETWEEN`,
//!   over an empty set → `IS NULL`
//! - `and` / `or` operands are sorted by their rendered text and joined;
//!   the join is parenthesized only when nested inside another operation
//!
//! Exclusive ranges and regular expressions are unsupported. Under `and`
//! they are simply dropped, since the store then returns a superset of the
//! matching items. An `or` or `not` containing one cannot be narrowed that
//! way, so the whole operation moves to the residual tree instead.

use crate::condition::{Comparison, ComparisonOp, Condition, ConditionValue, Connective, Operation};
use crate::observability::Logger;

use super::errors::{CompileError, CompileResult};
use super::quoting::{quote_json, quote_name};
use super::template;

/// Output of compilation
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledWhere {
    /// Dialect text; empty when nothing could be pushed to the store
    pub text: String,
    /// Clauses left for local evaluation; the empty `and` when there are none
    pub residual: Condition,
}

impl CompiledWhere {
    /// Returns true if the store filter is empty
    pub fn is_unfiltered(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns true if nothing needs local evaluation
    pub fn is_exact(&self) -> bool {
        self.residual.is_vacuous()
    }
}

/// Rendered form of one node
#[derive(Debug, Clone, PartialEq)]
enum Fragment {
    /// Dialect text
    Text(String),
    /// Node holds for every item and contributes nothing to the filter
    Always,
    /// Node cannot be rendered; it lives in the residual
    Unsupported,
}

/// Compiles a condition tree.
///
/// Deterministic: the same tree always renders the same text, regardless of
/// operand order.
pub fn compile(root: &Condition) -> CompileResult<CompiledWhere> {
    let (fragment, residual) = compile_node(root, false)?;
    let text = match fragment {
        Fragment::Text(text) => text,
        Fragment::Always | Fragment::Unsupported => String::new(),
    };
    Ok(CompiledWhere {
        text,
        residual: residual.unwrap_or_else(Condition::always),
    })
}

fn compile_node(node: &Condition, nested: bool) -> CompileResult<(Fragment, Option<Condition>)> {
    match node {
        Condition::Comparison(comparison) => {
            if comparison.is_unsupported() {
                validate_comparison(comparison)?;
                warn_unsupported(comparison);
                return Ok((Fragment::Unsupported, Some(node.clone())));
            }
            let text = comparison_text(comparison, false)?;
            Ok((Fragment::Text(text), None))
        }
        Condition::Operation(operation) => compile_operation(node, operation, nested),
        Condition::Raw(raw) => {
            let text = template::render(raw);
            let text = if nested { format!("( {} )", text) } else { text };
            Ok((Fragment::Text(text), None))
        }
    }
}

fn compile_operation(
    node: &Condition,
    operation: &Operation,
    nested: bool,
) -> CompileResult<(Fragment, Option<Condition>)> {
    match operation.connective {
        Connective::Not => {
            let operand = match operation.operands.as_slice() {
                [operand] => operand,
                _ => {
                    return Err(CompileError::unrecognized_node(
                        format!("not requires exactly one operand, got {}", operation.operands.len()),
                        node,
                    ))
                }
            };
            let fragment = negate(operand)?;
            if fragment == Fragment::Unsupported {
                return Ok((fragment, Some(node.clone())));
            }
            Ok((fragment, None))
        }
        Connective::And => {
            let mut texts = Vec::new();
            let mut residuals = Vec::new();
            for operand in &operation.operands {
                let (fragment, residual) = compile_node(operand, true)?;
                if let Fragment::Text(text) = fragment {
                    texts.push(text);
                }
                if let Some(residual) = residual {
                    residuals.push(residual);
                }
            }
            let residual = if residuals.is_empty() {
                None
            } else {
                Some(Condition::and(residuals))
            };
            Ok((join(texts, Connective::And, nested), residual))
        }
        Connective::Or => {
            if operation.operands.is_empty() {
                return Err(CompileError::unrecognized_node("or requires operands", node));
            }
            let mut texts = Vec::new();
            let mut always = false;
            for operand in &operation.operands {
                let (fragment, residual) = compile_node(operand, true)?;
                // A partially rendered operand would widen the disjunction.
                if residual.is_some() {
                    return Ok((Fragment::Unsupported, Some(node.clone())));
                }
                match fragment {
                    Fragment::Text(text) => texts.push(text),
                    Fragment::Always => always = true,
                    Fragment::Unsupported => {
                        return Ok((Fragment::Unsupported, Some(node.clone())));
                    }
                }
            }
            if always {
                return Ok((Fragment::Always, None));
            }
            Ok((join(texts, Connective::Or, nested), None))
        }
    }
}

fn negate(operand: &Condition) -> CompileResult<Fragment> {
    if let Condition::Comparison(comparison) = operand {
        if !comparison.is_unsupported() {
            match (comparison.op, &comparison.value) {
                (ComparisonOp::Eq, _) => {
                    return Ok(Fragment::Text(comparison_text(comparison, true)?));
                }
                // Membership in nothing is false, so its negation is vacuous.
                (ComparisonOp::In, value) if value.is_empty_set() => return Ok(Fragment::Always),
                _ => {}
            }
        }
    }

    match compile_node(operand, true)? {
        (Fragment::Text(text), None) => Ok(Fragment::Text(format!("NOT {}", text))),
        _ => Ok(Fragment::Unsupported),
    }
}

fn join(mut texts: Vec<String>, connective: Connective, nested: bool) -> Fragment {
    if texts.is_empty() {
        return Fragment::Always;
    }
    texts.sort();
    let joined = texts.join(&format!(" {} ", connective.keyword()));
    if nested {
        Fragment::Text(format!("( {} )", joined))
    } else {
        Fragment::Text(joined)
    }
}

fn validate_comparison(comparison: &Comparison) -> CompileResult<()> {
    let valid = match (comparison.op, &comparison.value) {
        (ComparisonOp::Eq, ConditionValue::Null | ConditionValue::Scalar(_)) => true,
        (
            ComparisonOp::Gt | ComparisonOp::Gte | ComparisonOp::Lt | ComparisonOp::Lte,
            ConditionValue::Scalar(_),
        ) => true,
        (ComparisonOp::Like, ConditionValue::Scalar(_)) => true,
        (ComparisonOp::In, ConditionValue::Set(_) | ConditionValue::Range { .. }) => true,
        (ComparisonOp::Regexp, ConditionValue::Pattern(_)) => true,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CompileError::unrecognized_node(
            format!("{} cannot take value {}", comparison.op.as_str(), comparison.value),
            Condition::Comparison(comparison.clone()),
        ))
    }
}

fn comparison_text(comparison: &Comparison, negated: bool) -> CompileResult<String> {
    validate_comparison(comparison)?;
    let field = quote_name(&comparison.field);

    let text = match (comparison.op, &comparison.value) {
        (ComparisonOp::Eq, ConditionValue::Null) => {
            let op = if negated { "IS NOT" } else { "IS" };
            format!("{} {} NULL", field, op)
        }
        (ComparisonOp::Eq, ConditionValue::Scalar(value)) => {
            let op = if negated { "!=" } else { "=" };
            format!("{} {} {}", field, op, quote_json(value))
        }
        (ComparisonOp::In, ConditionValue::Set(values)) if values.is_empty() => {
            format!("{} IS NULL", field)
        }
        (ComparisonOp::In, ConditionValue::Set(values)) => {
            let list: Vec<String> = values.iter().map(quote_json).collect();
            format!("{} IN ({})", field, list.join(", "))
        }
        (ComparisonOp::In, ConditionValue::Range { start, end, .. }) => {
            format!("{} BETWEEN {} AND {}", field, quote_json(start), quote_json(end))
        }
        (op, ConditionValue::Scalar(value)) => {
            let symbol = match op {
                ComparisonOp::Gt => ">",
                ComparisonOp::Gte => ">=",
                ComparisonOp::Lt => "<",
                ComparisonOp::Lte => "<=",
                _ => "LIKE",
            };
            format!("{} {} {}", field, symbol, quote_json(value))
        }
        _ => {
            return Err(CompileError::unrecognized_node(
                "comparison has no dialect rendering",
                Condition::Comparison(comparison.clone()),
            ))
        }
    };
    Ok(text)
}

fn warn_unsupported(comparison: &Comparison) {
    let kind = match comparison.op {
        ComparisonOp::Regexp => "regexp",
        _ => "exclusive_range",
    };
    Logger::warn(
        "WHERE_CLAUSE_UNSUPPORTED",
        &[("field", comparison.field.as_str()), ("kind", kind)],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Pattern;
    use serde_json::json;

    fn text(cond: &Condition) -> String {
        compile(cond).unwrap().text
    }

    #[test]
    fn test_bare_comparison_at_root() {
        assert_eq!(text(&Condition::eq("title", "FOO")), r#"title = "FOO""#);
    }

    #[test]
    fn test_root_and_not_parenthesized() {
        let cond = Condition::and(vec![Condition::eq("a", "1"), Condition::eq("b", "2")]);
        assert_eq!(text(&cond), r#"a = "1" AND b = "2""#);
    }

    #[test]
    fn test_operand_order_independent() {
        let a = Condition::and(vec![Condition::eq("x", "1"), Condition::gt("y", 2)]);
        let b = Condition::and(vec![Condition::gt("y", 2), Condition::eq("x", "1")]);
        assert_eq!(text(&a), text(&b));
    }

    #[test]
    fn test_not_over_comparison() {
        let cond = Condition::not(Condition::gt("age", 5));
        assert_eq!(text(&cond), r#"NOT age > "5""#);
    }

    #[test]
    fn test_not_with_two_operands_rejected() {
        let cond = Condition::Operation(Operation::new(
            Connective::Not,
            vec![Condition::eq("a", "1"), Condition::eq("b", "2")],
        ));
        let err = compile(&cond).unwrap_err();
        assert_eq!(err.code().code(), "SDB_UNRECOGNIZED_NODE");
    }

    #[test]
    fn test_mismatched_value_rejected() {
        let cond = Condition::Comparison(Comparison::new(
            ComparisonOp::Gt,
            "age",
            ConditionValue::Set(vec![]),
        ));
        assert!(compile(&cond).is_err());

        let cond = Condition::Comparison(Comparison::new(
            ComparisonOp::Eq,
            "title",
            ConditionValue::Pattern(Pattern::new("x").unwrap()),
        ));
        assert!(compile(&cond).is_err());
    }

    #[test]
    fn test_empty_or_rejected() {
        assert!(compile(&Condition::or(vec![])).is_err());
    }

    #[test]
    fn test_unsupported_under_or_moves_whole_or() {
        let regex = Condition::regexp("title", Pattern::new("fo+").unwrap());
        let or = Condition::or(vec![Condition::eq("body", "bar"), regex]);
        let root = Condition::and(vec![Condition::eq("kind", "post"), or.clone()]);

        let compiled = compile(&root).unwrap();
        assert_eq!(compiled.text, r#"kind = "post""#);
        assert_eq!(compiled.residual, Condition::and(vec![or]));
    }

    #[test]
    fn test_unsupported_under_not_moves_whole_not() {
        let not = Condition::not(Condition::in_exclusive_range("title", 1, 5));
        let root = Condition::and(vec![not.clone()]);

        let compiled = compile(&root).unwrap();
        assert_eq!(compiled.text, "");
        assert_eq!(compiled.residual, Condition::and(vec![not]));
    }

    #[test]
    fn test_partial_and_under_or_moves_whole_or() {
        let regex = Condition::regexp("t", Pattern::new("^z").unwrap());
        let or = Condition::or(vec![
            Condition::and(vec![Condition::eq("a", "1"), regex]),
            Condition::eq("b", "2"),
        ]);
        let compiled = compile(&or).unwrap();
        assert!(compiled.is_unfiltered());
        assert_eq!(compiled.residual, or);
    }

    #[test]
    fn test_partial_and_under_not_moves_whole_not() {
        let regex = Condition::regexp("t", Pattern::new("^z").unwrap());
        let not = Condition::not(Condition::and(vec![Condition::eq("a", "1"), regex]));
        let compiled = compile(&not).unwrap();
        assert!(compiled.is_unfiltered());
        assert_eq!(compiled.residual, not);
    }

    #[test]
    fn test_bare_unsupported_root_is_its_own_residual() {
        let regex = Condition::regexp("title", Pattern::new("foo").unwrap());
        let compiled = compile(&regex).unwrap();
        assert!(compiled.is_unfiltered());
        assert_eq!(compiled.residual, regex);
    }

    #[test]
    fn test_nested_and_residual_keeps_ancestry() {
        let regex = Condition::regexp("title", Pattern::new("foo").unwrap());
        let root = Condition::and(vec![
            Condition::eq("a", "1"),
            Condition::and(vec![regex.clone(), Condition::eq("b", "2")]),
        ]);
        let compiled = compile(&root).unwrap();
        assert_eq!(compiled.text, r#"( b = "2" ) AND a = "1""#);
        assert_eq!(
            compiled.residual,
            Condition::and(vec![Condition::and(vec![regex])])
        );
    }

    #[test]
    fn test_or_with_vacuous_operand_is_vacuous() {
        let cond = Condition::and(vec![
            Condition::eq("a", "1"),
            Condition::or(vec![
                Condition::eq("b", "2"),
                Condition::not(Condition::in_set("c", Vec::<&str>::new())),
            ]),
        ]);
        assert_eq!(text(&cond), r#"a = "1""#);
    }

    #[test]
    fn test_quoted_field_names() {
        let cond = Condition::eq("created-at", "2020");
        assert_eq!(text(&cond), r#"`created-at` = "2020""#);
    }

    #[test]
    fn test_nested_raw_template_parenthesized() {
        let cond = Condition::and(vec![
            Condition::eq("a", "1"),
            Condition::raw("x = ? OR y = ?", vec![json!("2"), json!("3")]),
        ]);
        assert_eq!(text(&cond), r#"( x = "2" OR y = "3" ) AND a = "1""#);
        assert_eq!(
            text(&Condition::raw("x = ?", vec![json!("2")])),
            r#"x = "2""#
        );
    }
}
