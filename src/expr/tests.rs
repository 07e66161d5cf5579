//! Tests for the expression evaluator

use super::*;
use crate::context::RequestContext;
use serde_json::json;

fn context() -> RequestContext {
    let mut ctx = RequestContext::new();
    ctx.extracted_data.insert("status".into(), json!(429));
    ctx.extracted_data.insert("page".into(), json!(3));
    ctx.extracted_data
        .insert("items".into(), json!([{"id": 1, "kind": "a"}, {"id": 2, "kind": "b"}]));
    ctx.extracted_data.insert("term".into(), json!("a b"));
    ctx.extracted_data.insert("empty".into(), json!(null));
    ctx.credentials.insert("API Key".into(), "k".into());
    ctx
}

// ============================================================================
// Literals & Variables
// ============================================================================

#[test]
fn test_literals() {
    let ctx = RequestContext::new();
    assert_eq!(evaluate("42", &ctx).unwrap(), json!(42));
    assert_eq!(evaluate("-7", &ctx).unwrap(), json!(-7));
    assert_eq!(evaluate("1.5", &ctx).unwrap(), json!(1.5));
    assert_eq!(evaluate("'hello'", &ctx).unwrap(), json!("hello"));
    assert_eq!(evaluate("\"hi\"", &ctx).unwrap(), json!("hi"));
    assert_eq!(evaluate("true", &ctx).unwrap(), json!(true));
    assert_eq!(evaluate("false", &ctx).unwrap(), json!(false));
    assert_eq!(evaluate("null", &ctx).unwrap(), json!(null));
}

#[test]
fn test_variable_resolution() {
    let ctx = context();
    assert_eq!(evaluate("page", &ctx).unwrap(), json!(3));
    assert_eq!(evaluate(" page ", &ctx).unwrap(), json!(3));

    let err = evaluate("missing", &ctx).unwrap_err();
    assert!(err.to_string().contains("Unresolved variable: missing"));
}

#[test]
fn test_outer_parentheses_strip() {
    let ctx = context();
    assert_eq!(evaluate("(page)", &ctx).unwrap(), json!(3));
    assert_eq!(evaluate("((42))", &ctx).unwrap(), json!(42));
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_comparisons() {
    let ctx = context();
    assert_eq!(evaluate("status == 429", &ctx).unwrap(), json!(true));
    assert_eq!(evaluate("status != 429", &ctx).unwrap(), json!(false));
    assert_eq!(evaluate("page >= 3", &ctx).unwrap(), json!(true));
    assert_eq!(evaluate("page <= 2", &ctx).unwrap(), json!(false));
    assert_eq!(evaluate("page > 2", &ctx).unwrap(), json!(true));
    assert_eq!(evaluate("page < 2", &ctx).unwrap(), json!(false));
}

#[test]
fn test_loose_equality_across_types() {
    let ctx = context();
    // Numeric strings compare numerically.
    assert_eq!(evaluate("status == '429'", &ctx).unwrap(), json!(true));
    assert_eq!(evaluate("'2' == 2", &ctx).unwrap(), json!(true));
}

#[test]
fn test_logical_operators_return_operands() {
    let ctx = context();
    assert_eq!(evaluate("page || 99", &ctx).unwrap(), json!(3));
    assert_eq!(evaluate("empty || 99", &ctx).unwrap(), json!(99));
    assert_eq!(evaluate("page && 99", &ctx).unwrap(), json!(99));
    assert_eq!(evaluate("empty && 99", &ctx).unwrap(), json!(null));
}

#[test]
fn test_arithmetic() {
    let ctx = context();
    assert_eq!(evaluate("page + 1", &ctx).unwrap(), json!(4));
    assert_eq!(evaluate("page * 2", &ctx).unwrap(), json!(6));
    assert_eq!(evaluate("10 / 4", &ctx).unwrap(), json!(2.5));
    assert_eq!(evaluate("10 - 4", &ctx).unwrap(), json!(6));

    assert!(evaluate("1 / 0", &ctx).is_err());
}

#[test]
fn test_plus_concatenates_strings() {
    let ctx = context();
    assert_eq!(
        evaluate("'v' + page", &ctx).unwrap(),
        json!("v3")
    );
}

#[test]
fn test_greedy_split_takes_last_occurrence() {
    let ctx = RequestContext::new();
    // (.+)-(.+) splits "10 - 4 - 1" at the last '-': (10 - 4) - 1.
    assert_eq!(evaluate("10 - 4 - 1", &ctx).unwrap(), json!(5));
}

#[test]
fn test_split_ignores_string_literal_content() {
    // The operator scan does not respect quotes; '&&' inside a string
    // literal still splits. Documented engine behavior.
    let ctx = RequestContext::new();
    let result = evaluate("'a&&b'", &ctx);
    assert!(result.is_err());
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_builtin_to_string_and_number() {
    let ctx = context();
    assert_eq!(evaluate("to_string(page)", &ctx).unwrap(), json!("3"));
    assert_eq!(evaluate("to_number('12')", &ctx).unwrap(), json!(12));
    assert_eq!(evaluate("to_number('nope')", &ctx).unwrap(), json!(null));
}

#[test]
fn test_builtin_encoders() {
    let ctx = context();
    assert_eq!(evaluate("url_encode(term)", &ctx).unwrap(), json!("a%20b"));
    assert_eq!(evaluate("base64('ab')", &ctx).unwrap(), json!("YWI="));
}

#[test]
fn test_builtin_count() {
    let ctx = context();
    assert_eq!(evaluate("count(items)", &ctx).unwrap(), json!(2));
    assert_eq!(evaluate("count(empty)", &ctx).unwrap(), json!(0));
    assert_eq!(evaluate("count(missing)", &ctx).unwrap(), json!(0));
    assert_eq!(evaluate("count(null)", &ctx).unwrap(), json!(0));
}

#[test]
fn test_builtin_max() {
    let ctx = context();
    assert_eq!(evaluate("max(1, 9, 4)", &ctx).unwrap(), json!(9));
    assert_eq!(evaluate("max(page, 1)", &ctx).unwrap(), json!(3));
    assert_eq!(evaluate("max()", &ctx).unwrap(), json!(null));
}

#[test]
fn test_builtin_not() {
    let ctx = context();
    assert_eq!(evaluate("not(empty)", &ctx).unwrap(), json!(true));
    assert_eq!(evaluate("not(page)", &ctx).unwrap(), json!(false));
}

#[test]
fn test_builtin_now() {
    let ctx = RequestContext::new();
    let now = evaluate("now()", &ctx).unwrap();
    assert!(now.as_i64().unwrap() > 1_600_000_000_000);
}

#[test]
fn test_builtin_find_in() {
    let ctx = context();
    assert_eq!(
        evaluate("find_in(items, 'id', 2)", &ctx).unwrap(),
        json!({"id": 2, "kind": "b"})
    );
    assert_eq!(
        evaluate("find_in(items, 'id', 7)", &ctx).unwrap(),
        json!(null)
    );
}

#[test]
fn test_nested_function_calls() {
    let ctx = context();
    assert_eq!(
        evaluate("to_string(count(items))", &ctx).unwrap(),
        json!("2")
    );
    assert_eq!(
        evaluate("max(count(items), 5)", &ctx).unwrap(),
        json!(5)
    );
}

#[test]
fn test_zero_argument_invocation() {
    let ctx = RequestContext::new();
    assert!(evaluate("now()", &ctx).is_ok());
    assert_eq!(evaluate("max()", &ctx).unwrap(), json!(null));
}

#[test]
fn test_unknown_function() {
    let ctx = RequestContext::new();
    let err = evaluate("bogus(1)", &ctx).unwrap_err();
    assert!(err.to_string().contains("unknown function"));
}

// ============================================================================
// Truthiness & Gating
// ============================================================================

#[test]
fn test_truthiness() {
    assert!(!is_truthy(&json!(null)));
    assert!(!is_truthy(&json!(false)));
    assert!(!is_truthy(&json!(0)));
    assert!(!is_truthy(&json!("")));
    assert!(is_truthy(&json!("x")));
    assert!(is_truthy(&json!(1)));
    assert!(is_truthy(&json!([])));
    assert!(is_truthy(&json!({})));
}

#[test]
fn test_selectwhere_style_gate() {
    let ctx = context();
    assert_eq!(
        evaluate("count(items) > 0 && status == 429", &ctx).unwrap(),
        json!(true)
    );
}
