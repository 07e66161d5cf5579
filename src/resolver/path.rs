//! Path queries over response bodies
//!
//! A small JSONPath front-end: `[:_]` and `[_:]` wildcard spellings are
//! normalized to `[*]` up front, plain dot-paths take a fast manual walk,
//! and wildcard queries go through jsonpath-rust.

use crate::error::{Error, Result};
use serde_json::Value;

/// Run a path query against a body, returning all matches in document order
pub fn query(body: &Value, path: &str) -> Result<Vec<Value>> {
    let normalized = normalize(path);

    if normalized.contains('*') {
        query_jsonpath(body, &normalized)
    } else {
        Ok(walk_simple(body, &normalized).into_iter().collect())
    }
}

/// Rewrite `[:_]` and `[_:]` tokens to the `[*]` wildcard
pub fn normalize(path: &str) -> String {
    path.replace("[:_]", "[*]").replace("[_:]", "[*]")
}

/// Execute a wildcard query through jsonpath-rust
fn query_jsonpath(body: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::json_path(format!("Invalid path '{path}': {e}")))?;

    match jp.find(body) {
        Value::Array(matches) => Ok(matches),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}

/// Walk a plain `$.a.b[0].c` path without a query engine
fn walk_simple(body: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut current = body;

    for segment in path.split('.').filter(|s| !s.is_empty()) {
        // Each segment may carry one or more index suffixes: items[0][1]
        let (field, indexes) = split_indexes(segment)?;

        if !field.is_empty() {
            current = current.get(field)?;
        }
        for index in indexes {
            current = current.get(index)?;
        }
    }

    Some(current.clone())
}

/// Split `items[0][2]` into the field name and its index chain
fn split_indexes(segment: &str) -> Option<(&str, Vec<usize>)> {
    match segment.find('[') {
        None => Some((segment, Vec::new())),
        Some(start) => {
            let field = &segment[..start];
            let mut indexes = Vec::new();
            let mut rest = &segment[start..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']')?;
                indexes.push(stripped[..end].parse().ok()?);
                rest = &stripped[end + 1..];
            }
            if rest.is_empty() {
                Some((field, indexes))
            } else {
                None
            }
        }
    }
}
