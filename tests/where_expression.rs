//! Where-Expression Compilation Tests
//!
//! Covers rendering of each comparison kind, connective nesting, raw
//! templates, residual extraction and rejection of malformed trees.

use sdb_adapter::condition::{Condition, ConditionMatcher, Pattern};
use sdb_adapter::where_expr::{compile, CompileErrorCode};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

// =============================================================================
// Test Utilities
// =============================================================================

fn text(condition: &Condition) -> String {
    compile(condition).expect("condition should compile").text
}

fn record(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("record is an object")
}

// =============================================================================
// Comparisons
// =============================================================================

#[test]
fn test_equality_and_null_forms() {
    assert_eq!(text(&Condition::eq("title", "FOO")), r#"title = "FOO""#);
    assert_eq!(text(&Condition::ne("title", "FOO")), r#"title != "FOO""#);
    assert_eq!(text(&Condition::is_null("body")), "body IS NULL");
    assert_eq!(text(&Condition::not_null("body")), "body IS NOT NULL");
}

#[test]
fn test_ordering_and_pattern_forms() {
    assert_eq!(text(&Condition::gt("age", 5)), r#"age > "5""#);
    assert_eq!(text(&Condition::gte("age", 5)), r#"age >= "5""#);
    assert_eq!(text(&Condition::lt("age", 5)), r#"age < "5""#);
    assert_eq!(text(&Condition::lte("age", 5)), r#"age <= "5""#);
    assert_eq!(text(&Condition::like("title", "Acer%")), r#"title LIKE "Acer%""#);
}

#[test]
fn test_membership_forms() {
    assert_eq!(
        text(&Condition::in_set("tag", ["a", "b"])),
        r#"tag IN ("a", "b")"#
    );
    assert_eq!(
        text(&Condition::in_range("n", 1, 5)),
        r#"n BETWEEN "1" AND "5""#
    );
    assert_eq!(
        text(&Condition::in_set("tag", Vec::<Value>::new())),
        "tag IS NULL"
    );
}

#[test]
fn test_odd_names_and_values_quoted() {
    assert_eq!(
        text(&Condition::eq("created-at", "say \"hi\"")),
        r#"`created-at` = "say ""hi""""#
    );
}

// =============================================================================
// Connectives
// =============================================================================

#[test]
fn test_nested_operations_parenthesized() {
    let condition = Condition::and(vec![
        Condition::eq("a", 1),
        Condition::or(vec![Condition::eq("b", 2), Condition::eq("c", 3)]),
    ]);
    assert_eq!(text(&condition), r#"( b = "2" OR c = "3" ) AND a = "1""#);
}

#[test]
fn test_operand_order_does_not_matter() {
    let forward = Condition::and(vec![Condition::eq("a", 1), Condition::gt("b", 2)]);
    let reverse = Condition::and(vec![Condition::gt("b", 2), Condition::eq("a", 1)]);
    assert_eq!(text(&forward), text(&reverse));
}

#[test]
fn test_negated_operation() {
    let condition = Condition::not(Condition::and(vec![
        Condition::eq("a", 1),
        Condition::eq("b", 2),
    ]));
    assert_eq!(text(&condition), r#"NOT ( a = "1" AND b = "2" )"#);
}

#[test]
fn test_raw_templates() {
    let positional = Condition::raw("body in (?, ?)", vec![json!("FUZ"), json!("BUZ")]);
    assert_eq!(text(&positional), r#"body in ("FUZ", "BUZ")"#);

    let mut args = BTreeMap::new();
    args.insert("title".to_string(), json!("foo"));
    let named = Condition::raw_named("title = :title", args);
    assert_eq!(text(&named), r#"title = "foo""#);
}

// =============================================================================
// Residual Extraction
// =============================================================================

#[test]
fn test_unsupported_under_and_goes_to_residual() {
    let regexp = Condition::regexp("title", Pattern::new("^A").expect("pattern is valid"));
    let exclusive = Condition::in_exclusive_range("n", 1, 5);
    let compiled = compile(&Condition::and(vec![
        Condition::eq("kind", "post"),
        regexp.clone(),
        exclusive.clone(),
    ]))
    .expect("condition should compile");

    assert_eq!(compiled.text, r#"kind = "post""#);
    assert_eq!(compiled.residual, Condition::and(vec![regexp, exclusive]));
    assert!(!compiled.is_exact());
}

#[test]
fn test_disjunction_with_unsupported_moves_whole() {
    let or = Condition::or(vec![
        Condition::eq("a", 1),
        Condition::regexp("b", Pattern::new("x").expect("pattern is valid")),
    ]);
    let compiled = compile(&Condition::and(vec![Condition::eq("k", "v"), or.clone()]))
        .expect("condition should compile");

    assert_eq!(compiled.text, r#"k = "v""#);
    assert_eq!(compiled.residual, Condition::and(vec![or]));
}

#[test]
fn test_residual_never_loses_matches() {
    // Store filter plus residual must accept exactly what the full tree accepts.
    let full = Condition::and(vec![
        Condition::eq("kind", "post"),
        Condition::in_exclusive_range("n", 1, 5),
    ]);
    let compiled = compile(&full).expect("condition should compile");

    let inside = record(json!({"kind": "post", "n": 4}));
    let boundary = record(json!({"kind": "post", "n": 5}));
    assert!(ConditionMatcher::matches(&inside, &compiled.residual));
    assert!(!ConditionMatcher::matches(&boundary, &compiled.residual));
    assert!(ConditionMatcher::matches(&inside, &full));
    assert!(!ConditionMatcher::matches(&boundary, &full));
}

#[test]
fn test_disjunction_over_partial_conjunction_moves_whole() {
    let or = Condition::or(vec![
        Condition::and(vec![
            Condition::eq("a", "1"),
            Condition::regexp("t", Pattern::new("^z").expect("pattern is valid")),
        ]),
        Condition::eq("b", "2"),
    ]);
    let compiled = compile(&or).expect("condition should compile");

    assert!(compiled.is_unfiltered());
    assert_eq!(compiled.residual, or);

    // Matches the text `a = "1"` but not the regexp, so it must be rejected.
    let stray = record(json!({"a": "1", "t": "q", "b": "9"}));
    assert!(!ConditionMatcher::matches(&stray, &or));
    assert!(!ConditionMatcher::matches(&stray, &compiled.residual));
}

#[test]
fn test_negated_partial_conjunction_moves_whole() {
    let not = Condition::not(Condition::and(vec![
        Condition::eq("a", "1"),
        Condition::regexp("t", Pattern::new("^z").expect("pattern is valid")),
    ]));
    let compiled = compile(&not).expect("condition should compile");

    assert!(!compiled.text.contains("NOT"));
    assert_eq!(compiled.residual, not);

    // Accepted by the full tree; a `NOT ( a = "1" )` store filter would drop it.
    let kept = record(json!({"a": "1", "t": "q"}));
    assert!(ConditionMatcher::matches(&kept, &not));
    assert!(ConditionMatcher::matches(&kept, &compiled.residual));
}

#[test]
fn test_empty_tree_is_unfiltered() {
    let compiled = compile(&Condition::always()).expect("condition should compile");
    assert!(compiled.is_unfiltered());
    assert!(compiled.is_exact());
}

// =============================================================================
// Rejection
// =============================================================================

#[test]
fn test_malformed_trees_rejected() {
    let empty_or = compile(&Condition::or(vec![])).unwrap_err();
    assert_eq!(empty_or.code(), CompileErrorCode::SdbUnrecognizedNode);

    let bad_not = Condition::Operation(sdb_adapter::condition::Operation::new(
        sdb_adapter::condition::Connective::Not,
        vec![Condition::eq("a", 1), Condition::eq("b", 2)],
    ));
    assert!(compile(&bad_not).is_err());
}
