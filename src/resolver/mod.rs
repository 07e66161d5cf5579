//! Dependency resolver
//!
//! Given a dependency edge and the response history, extracts values from
//! the source responses and produces child contexts for the edge's targets:
//! one context per element of the cartesian product of the per-name value
//! lists. Values flagged `authy` are persisted to the token store as a side
//! effect of extraction.

mod path;

pub use path::{normalize, query};

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::expr::{evaluate, is_truthy, value_to_number, value_to_string};
use crate::manifest::{DependencyDef, SelectDef, SelectType};
use crate::store::TokenStore;
use crate::types::{Response, ResponseHistory};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::debug;

/// Resolves dependency edges into child execution contexts
pub struct Resolver<'a> {
    store: &'a TokenStore,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over the run's token store
    pub fn new(store: &'a TokenStore) -> Self {
        Self { store }
    }

    /// Resolve one edge into child contexts.
    ///
    /// `latest_only` restricts each source to its most recent response; the
    /// executor sets it for pagination edges so only the newest page feeds
    /// the next request.
    pub async fn resolve(
        &self,
        edge: &DependencyDef,
        history: &ResponseHistory,
        parent: &RequestContext,
        latest_only: bool,
    ) -> Result<Vec<RequestContext>> {
        let mut sources: Vec<&Response> = Vec::new();
        for name in &edge.from {
            if latest_only {
                sources.extend(history.latest(name));
            } else {
                sources.extend(history.get(name).iter());
            }
        }

        // Extract every select across every source response, then dedup
        // preserving first-seen order.
        let mut extracted: Vec<(String, Vec<Value>)> = Vec::new();
        for select in &edge.select {
            let mut values = Vec::new();
            for response in &sources {
                match extract_select(select, response, parent) {
                    Ok(mut found) => values.append(&mut found),
                    Err(e) => {
                        debug!("select '{}' yielded nothing: {e}", select.name);
                    }
                }
            }
            let values = dedup(values);

            if select.authy {
                if let Some(first) = values.first() {
                    self.store
                        .save_authy_value(&select.name, first.clone())
                        .await?;
                }
            }

            if !values.is_empty() {
                extracted.push((select.name.clone(), values));
            }
        }

        // Gate on selectwhere, seeing the first value of every name.
        if let Some(expr) = &edge.selectwhere {
            let firsts = extracted
                .iter()
                .map(|(name, values)| (name.clone(), values[0].clone()));
            let augmented = parent.child_with_all(firsts);
            let pass = match evaluate(expr, &augmented) {
                Ok(value) => is_truthy(&value),
                Err(e) => {
                    debug!("selectwhere did not pass: {e}");
                    false
                }
            };
            if !pass {
                return Ok(Vec::new());
            }
        }

        if extracted.is_empty() {
            return Ok(Vec::new());
        }

        // Cartesian product, first select outermost, values in first-seen
        // order: index order is deterministic.
        let mut contexts = vec![parent.clone()];
        for (name, values) in &extracted {
            let mut expanded = Vec::with_capacity(contexts.len() * values.len());
            for ctx in &contexts {
                for value in values {
                    expanded.push(ctx.child_with(name.clone(), value.clone()));
                }
            }
            contexts = expanded;
        }

        Ok(contexts)
    }
}

/// Extract the values one select descriptor yields from one response
fn extract_select(
    select: &SelectDef,
    response: &Response,
    ctx: &RequestContext,
) -> Result<Vec<Value>> {
    // Nested selects bind first so an outer expr can reference them.
    let mut nested_lists: Vec<Vec<Value>> = Vec::new();
    let mut augmented = ctx.clone();
    for nested in &select.select {
        let values = extract_select(nested, response, ctx)?;
        augmented
            .extracted_data
            .insert(nested.name.clone(), Value::Array(values.clone()));
        nested_lists.push(values);
    }

    if let Some(expr) = &select.expr {
        return Ok(vec![evaluate(expr, &augmented)?]);
    }

    if !select.select.is_empty() {
        return Ok(nested_lists.into_iter().flatten().collect());
    }

    match select.select_type {
        Some(SelectType::FullBody) => {
            let mut text = serde_json::to_string(&response.body)?;
            if let Some(limit) = select.up_to {
                truncate_bytes(&mut text, limit);
            }
            return Ok(vec![Value::String(text)]);
        }
        Some(SelectType::Status) => {
            return Ok(vec![json!(response.status)]);
        }
        _ => {}
    }

    let path = select.path.as_ref().ok_or_else(|| Error::Select {
        name: select.name.clone(),
        message: "path is required when no expr or derived type is set".into(),
    })?;

    let results = query(&response.body, path)?;
    if results.is_empty() {
        return Ok(Vec::new());
    }

    // Nested-aggregation pattern: a number-typed select whose matches are
    // objects passes them through unconverted.
    if select.select_type == Some(SelectType::Number) && results.iter().all(Value::is_object) {
        return Ok(results);
    }

    Ok(results
        .into_iter()
        .filter_map(|value| coerce(select.select_type, value))
        .collect())
}

/// Coerce one path match per the declared type; None drops the value
fn coerce(select_type: Option<SelectType>, value: Value) -> Option<Value> {
    match select_type {
        Some(SelectType::String) => {
            let text = value_to_string(&value);
            match text.as_str() {
                "" | "null" | "undefined" => None,
                _ => Some(Value::String(text)),
            }
        }
        Some(SelectType::Number) => value_to_number(&value).map(crate::expr::number_value),
        _ => Some(value),
    }
}

/// Set-deduplicate values, preserving first-seen order
fn dedup(values: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.to_string()))
        .collect()
}

/// Truncate to a byte budget without splitting a UTF-8 sequence
fn truncate_bytes(text: &mut String, limit: usize) {
    if text.len() > limit {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
}
