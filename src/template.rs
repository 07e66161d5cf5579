//! Template interpolation
//!
//! Handles `{{NAME}}` interpolation in URLs, headers, bodies, and OAuth2
//! arguments. Names resolve against a [`RequestContext`] in its documented
//! order. Replacement is non-recursive: matches are collected from the
//! original string and replacements are never re-scanned.

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::expr::value_to_string;
use regex::Regex;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ name }}
static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap());

/// Render a template string, erroring on any unresolved variable
pub fn render(template: &str, ctx: &RequestContext) -> Result<String> {
    let mut result = template.to_string();
    let mut errors = Vec::new();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let full_match = cap.get(0).unwrap().as_str();
        let name = cap.get(1).unwrap().as_str();

        match ctx.resolve(name) {
            Some(value) => {
                result = result.replace(full_match, &value_to_string(&value));
            }
            None => errors.push(name.to_string()),
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(Error::unresolved(errors.join(", ")))
    }
}

/// Render a template, leaving unresolved variables in place
pub fn render_optional(template: &str, ctx: &RequestContext) -> String {
    let mut result = template.to_string();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let full_match = cap.get(0).unwrap().as_str();
        let name = cap.get(1).unwrap().as_str();

        if let Some(value) = ctx.resolve(name) {
            result = result.replace(full_match, &value_to_string(&value));
        }
    }

    result
}

/// Render a template using extracted data only, leaving everything else.
///
/// URL pre-interpolation uses this so a later completeness check can detect
/// placeholders the full context still cannot satisfy.
pub fn render_extracted(template: &str, ctx: &RequestContext) -> String {
    let mut result = template.to_string();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let full_match = cap.get(0).unwrap().as_str();
        let name = cap.get(1).unwrap().as_str();

        if let Some(value) = ctx.extracted_data.get(name) {
            result = result.replace(full_match, &value_to_string(value));
        }
    }

    result
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Names in a template the context cannot resolve
pub fn unresolved_variables(template: &str, ctx: &RequestContext) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap.get(1).unwrap().as_str().to_string())
        .filter(|name| !ctx.contains(name))
        .collect()
}
