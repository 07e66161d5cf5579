//! Pipeline implementation

use crate::context::RequestContext;
use crate::error::Result;
use crate::expr::{evaluate, is_truthy};
use crate::manifest::{ConditionDef, ConditionSet, Manifest, RequestDef, TransformerDef};
use crate::template;
use crate::types::Response;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Default attempt ceiling for retry condition sets
const DEFAULT_RETRIES: u32 = 3;
/// Default initial backoff in milliseconds
const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
/// Default backoff cap in milliseconds
const DEFAULT_MAX_WAIT_MS: u64 = 60_000;

/// Retry verdict for one response attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry; hand the response back
    No,
    /// Retry after the given backoff delay
    After(Duration),
}

/// Fail verdict carrying the configured or generic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailVerdict {
    /// Message reported to the caller
    pub message: String,
}

/// The ordered transformer list applied to one request
#[derive(Debug, Clone, Default)]
pub struct Pipeline<'a> {
    transformers: Vec<&'a TransformerDef>,
}

impl<'a> Pipeline<'a> {
    /// Resolve a request's transformer names against the manifest.
    ///
    /// Unknown names were rejected at manifest load, so lookups here are
    /// simple filters.
    pub fn for_request(manifest: &'a Manifest, request: &RequestDef) -> Self {
        let transformers = request
            .transformers
            .iter()
            .filter_map(|name| manifest.transformer(name))
            .collect();
        Self { transformers }
    }

    /// Build a pipeline from explicit transformer definitions
    pub fn from_transformers(transformers: Vec<&'a TransformerDef>) -> Self {
        Self { transformers }
    }

    /// Merge each transformer's interpolated headers into the outgoing map.
    ///
    /// Later transformers override earlier ones on conflicting names.
    pub fn apply_to_request(
        &self,
        headers: &mut HashMap<String, String>,
        ctx: &RequestContext,
    ) -> Result<()> {
        for transformer in &self.transformers {
            if let Some(injected) = &transformer.headers {
                for (name, value) in injected {
                    headers.insert(name.clone(), template::render(value, ctx)?);
                }
            }
        }
        Ok(())
    }

    /// Whether the response should be retried, and after what delay
    pub fn should_retry(
        &self,
        response: &Response,
        ctx: &RequestContext,
        attempt: u32,
    ) -> RetryDecision {
        for transformer in &self.transformers {
            let Some(set) = &transformer.retrywhere else {
                continue;
            };
            if first_match(set, response, ctx).is_none() {
                continue;
            }

            // retries=N allows N delayed re-issues: attempts 1..=N sleep,
            // attempt N+1 gives up.
            let retries = set.retries.unwrap_or(DEFAULT_RETRIES);
            if attempt > retries {
                return RetryDecision::No;
            }

            let initial = set.initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY_MS);
            let cap = set.max_wait.unwrap_or(DEFAULT_MAX_WAIT_MS);
            let delay = initial
                .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(63))
                .min(cap);
            return RetryDecision::After(Duration::from_millis(delay));
        }
        RetryDecision::No
    }

    /// Whether the response calls for re-authentication
    pub fn should_reauth(&self, response: &Response, ctx: &RequestContext) -> bool {
        self.transformers.iter().any(|t| {
            t.reauthwhere
                .as_ref()
                .is_some_and(|set| first_match(set, response, ctx).is_some())
        })
    }

    /// Whether the response triggers a hard failure
    pub fn should_fail(&self, response: &Response, ctx: &RequestContext) -> Option<FailVerdict> {
        for transformer in &self.transformers {
            let Some(set) = &transformer.failwhere else {
                continue;
            };
            if let Some(condition) = first_match(set, response, ctx) {
                let message = condition
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("fail condition matched (status {})", response.status));
                return Some(FailVerdict { message });
            }
        }
        None
    }

    /// Declared rate limits, surfaced for introspection only
    pub fn rate_limits(&self) -> Vec<&Value> {
        self.transformers
            .iter()
            .filter_map(|t| t.ratelimits.as_ref())
            .flatten()
            .collect()
    }
}

/// The first condition in the set that matches the response.
///
/// A condition matches on equal status, or on its expression evaluating
/// truthy against a context augmented with the response body and status.
/// Expression errors count as non-matching.
fn first_match<'s>(
    set: &'s ConditionSet,
    response: &Response,
    ctx: &RequestContext,
) -> Option<&'s ConditionDef> {
    set.conditions.iter().find(|condition| {
        if condition.status == Some(response.status) {
            return true;
        }

        let Some(expr) = &condition.expr else {
            return false;
        };

        let augmented = ctx.child_with_all(vec![
            ("response".to_string(), response.body.clone()),
            ("status".to_string(), json!(response.status)),
        ]);
        match evaluate(expr, &augmented) {
            Ok(value) => is_truthy(&value),
            Err(e) => {
                debug!("condition expression did not match: {e}");
                false
            }
        }
    })
}
