//! Expression evaluator
//!
//! A small expression DSL used by `selectwhere` gates, selection `expr`
//! fields, and transformer conditions. Supports binary operators, a fixed
//! set of builtin functions, literals, and variable resolution against a
//! [`RequestContext`].
//!
//! The operator split deliberately mirrors the engine's historical
//! behavior: each operator is matched by a greedy left-to-right regex over
//! the raw string, which means the split does not respect parentheses or
//! string literals. Manifests in the field depend on expressions staying
//! stable, so this is kept as-is rather than replaced with a precedence
//! climber.

mod functions;

pub use functions::call_function;

use crate::context::RequestContext;
use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Operators in scan order. Earlier entries bind looser and are split first.
const OPERATORS: [&str; 12] = [
    "||", "&&", "==", "!=", ">=", "<=", ">", "<", "+", "-", "*", "/",
];

static OPERATOR_REGEXES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    OPERATORS
        .iter()
        .map(|op| {
            let pattern = format!("^(?s)(.+){}(.+)$", regex::escape(op));
            (*op, Regex::new(&pattern).expect("valid operator regex"))
        })
        .collect()
});

static FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?s)([A-Za-z_][A-Za-z0-9_]*)\((.*)\)$").expect("valid regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid regex"));

/// Evaluate an expression against a context
pub fn evaluate(expr: &str, ctx: &RequestContext) -> Result<Value> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(Error::expression("empty expression"));
    }

    // Operator scan. The greedy left group splits at the last occurrence.
    for (op, re) in OPERATOR_REGEXES.iter() {
        if let Some(caps) = re.captures(expr) {
            let left = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let right = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            if left.trim().is_empty() || right.trim().is_empty() {
                continue;
            }
            return apply_operator(op, left, right, ctx);
        }
    }

    // Outer parentheses strip
    if expr.starts_with('(') && expr.ends_with(')') && expr.len() >= 2 {
        return evaluate(&expr[1..expr.len() - 1], ctx);
    }

    // Function call. An unresolved variable inside an argument reads as
    // null, so count(missing) is 0 rather than an error.
    if let Some(caps) = FUNCTION_RE.captures(expr) {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let raw_args = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let args = split_top_level_args(raw_args)
            .into_iter()
            .map(|arg| match evaluate(&arg, ctx) {
                Err(Error::UnresolvedVariable { .. }) => Ok(Value::Null),
                other => other,
            })
            .collect::<Result<Vec<_>>>()?;
        return call_function(name, &args);
    }

    // Literals
    if let Some(literal) = parse_string_literal(expr) {
        return Ok(Value::String(literal));
    }
    if NUMBER_RE.is_match(expr) {
        let number: f64 = expr
            .parse()
            .map_err(|_| Error::expression(format!("invalid number literal: {expr}")))?;
        return Ok(number_value(number));
    }
    match expr {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }

    // Variable
    ctx.resolve(expr).ok_or_else(|| Error::unresolved(expr))
}

/// JS-style truthiness: `false`, `0`, `""`, and `null` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form of a value for interpolation and concatenation
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Numeric form of a value; numeric strings parse, everything else is None
pub fn value_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(true) => Some(1.0),
        Value::Bool(false) | Value::Null => Some(0.0),
        _ => None,
    }
}

/// Build a JSON number, collapsing integral floats to integers
pub fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9e15 {
        Value::Number((f as i64).into())
    } else {
        serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

/// Loose equality: numeric when both sides coerce, string form otherwise
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    if let (Some(l), Some(r)) = (value_to_number(left), value_to_number(right)) {
        return l == r;
    }
    value_to_string(left) == value_to_string(right)
}

fn apply_operator(op: &str, left: &str, right: &str, ctx: &RequestContext) -> Result<Value> {
    match op {
        "||" => {
            let l = evaluate(left, ctx)?;
            if is_truthy(&l) {
                Ok(l)
            } else {
                evaluate(right, ctx)
            }
        }
        "&&" => {
            let l = evaluate(left, ctx)?;
            if is_truthy(&l) {
                evaluate(right, ctx)
            } else {
                Ok(l)
            }
        }
        "==" => {
            let (l, r) = (evaluate(left, ctx)?, evaluate(right, ctx)?);
            Ok(Value::Bool(loose_eq(&l, &r)))
        }
        "!=" => {
            let (l, r) = (evaluate(left, ctx)?, evaluate(right, ctx)?);
            Ok(Value::Bool(!loose_eq(&l, &r)))
        }
        ">=" | "<=" | ">" | "<" => {
            let (l, r) = (evaluate(left, ctx)?, evaluate(right, ctx)?);
            Ok(Value::Bool(compare(op, &l, &r)))
        }
        "+" => {
            let (l, r) = (evaluate(left, ctx)?, evaluate(right, ctx)?);
            if l.is_string() || r.is_string() {
                Ok(Value::String(format!(
                    "{}{}",
                    value_to_string(&l),
                    value_to_string(&r)
                )))
            } else {
                arithmetic(op, &l, &r)
            }
        }
        "-" | "*" | "/" => {
            let (l, r) = (evaluate(left, ctx)?, evaluate(right, ctx)?);
            arithmetic(op, &l, &r)
        }
        _ => Err(Error::expression(format!("unknown operator: {op}"))),
    }
}

fn compare(op: &str, left: &Value, right: &Value) -> bool {
    // Two strings compare lexicographically; anything else numerically.
    if let (Value::String(l), Value::String(r)) = (left, right) {
        return match op {
            ">=" => l >= r,
            "<=" => l <= r,
            ">" => l > r,
            _ => l < r,
        };
    }

    match (value_to_number(left), value_to_number(right)) {
        (Some(l), Some(r)) => match op {
            ">=" => l >= r,
            "<=" => l <= r,
            ">" => l > r,
            _ => l < r,
        },
        _ => false,
    }
}

fn arithmetic(op: &str, left: &Value, right: &Value) -> Result<Value> {
    let l = value_to_number(left)
        .ok_or_else(|| Error::expression(format!("non-numeric operand for '{op}'")))?;
    let r = value_to_number(right)
        .ok_or_else(|| Error::expression(format!("non-numeric operand for '{op}'")))?;

    let result = match op {
        "+" => l + r,
        "-" => l - r,
        "*" => l * r,
        "/" => {
            if r == 0.0 {
                return Err(Error::expression("division by zero"));
            }
            l / r
        }
        _ => return Err(Error::expression(format!("unknown operator: {op}"))),
    };

    Ok(number_value(result))
}

/// Parse a single- or double-quoted string literal
fn parse_string_literal(expr: &str) -> Option<String> {
    let bytes = expr.as_bytes();
    if expr.len() >= 2 {
        let (first, last) = (bytes[0], bytes[expr.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return Some(expr[1..expr.len() - 1].to_string());
        }
    }
    None
}

/// Split a function argument list at top-level commas.
///
/// Commas nested inside parentheses or string literals do not split. An
/// empty list yields a zero-argument invocation.
fn split_top_level_args(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                current.push(ch);
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    args.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            },
        }
    }
    args.push(current);
    args
}

#[cfg(test)]
mod tests;
