//! HTTP client
//!
//! Issues a single declared request, honoring the transformer pipeline's
//! response classifications:
//! - fail conditions raise immediately, without retry
//! - retry conditions sleep the computed backoff and re-issue
//! - transport errors back off exponentially up to the attempt ceiling

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::manifest::RequestDef;
use crate::template;
use crate::transform::{Pipeline, RetryDecision};
use crate::types::Response;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt ceiling per request, counting retries and transport errors
const MAX_ATTEMPTS: u32 = 10;
/// Base backoff for transport-level errors, in milliseconds
const TRANSPORT_BACKOFF_MS: u64 = 1000;

/// Outcome of one executed request
#[derive(Debug)]
pub struct HttpOutcome {
    /// The final response
    pub response: Response,
    /// Whether a reauth condition matched on the final response
    pub needs_reauth: bool,
}

/// HTTP client for declared requests
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client with the engine's defaults
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("precog-extract/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Http)?;
        Ok(Self { client })
    }

    /// Issue one declared request at an already-interpolated URL.
    ///
    /// `url` has been rendered by the executor; body and headers are
    /// interpolated here against the same context.
    pub async fn request(
        &self,
        url: &str,
        request: &RequestDef,
        pipeline: &Pipeline<'_>,
        ctx: &RequestContext,
    ) -> Result<HttpOutcome> {
        let method: Method = request
            .method()
            .to_uppercase()
            .parse()
            .map_err(|_| Error::manifest(format!("invalid method on '{}'", request.name)))?;

        // The body template is only sent for POST requests.
        let body = if method == Method::POST {
            match &request.body {
                Some(template) => Some(template::render(template, ctx)?),
                None => None,
            }
        } else {
            None
        };

        let mut headers = HashMap::from([(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )]);
        if let Some(declared) = &request.headers {
            for (name, value) in declared {
                headers.insert(name.clone(), template::render(value, ctx)?);
            }
        }
        pipeline.apply_to_request(&mut headers, ctx)?;

        let mut attempt = 1u32;
        loop {
            let mut builder = self.client.request(method.clone(), url);
            for (name, value) in &headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            }

            match builder.send().await {
                Ok(raw) => {
                    let response = parse_response(raw).await?;

                    if let Some(verdict) = pipeline.should_fail(&response, ctx) {
                        return Err(Error::fail_condition(&request.name, verdict.message));
                    }

                    match pipeline.should_retry(&response, ctx, attempt) {
                        RetryDecision::After(delay) if attempt < MAX_ATTEMPTS => {
                            warn!(
                                "{} returned {}, attempt {attempt}, retrying in {delay:?}",
                                request.name, response.status
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                        _ => {}
                    }

                    let needs_reauth = pipeline.should_reauth(&response, ctx);
                    debug!("{} {} -> {}", request.method(), url, response.status);
                    return Ok(HttpOutcome {
                        response,
                        needs_reauth,
                    });
                }
                Err(e) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(Error::AttemptsExhausted {
                            request: request.name.clone(),
                            attempts: MAX_ATTEMPTS,
                            message: e.to_string(),
                        });
                    }

                    let delay = Duration::from_millis(
                        TRANSPORT_BACKOFF_MS.saturating_mul(1 << (attempt - 1).min(63)),
                    );
                    warn!(
                        "{} transport error ({e}), attempt {attempt}, retrying in {delay:?}",
                        request.name
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Parse a wire response: JSON bodies parse, everything else stays text.
/// The raw text is always retained.
async fn parse_response(raw: reqwest::Response) -> Result<Response> {
    let status = raw.status().as_u16();

    let mut headers = HashMap::new();
    for (name, value) in raw.headers() {
        if let Ok(text) = value.to_str() {
            headers.insert(name.as_str().to_lowercase(), text.to_string());
        }
    }

    let is_json = headers
        .get("content-type")
        .is_some_and(|ct| ct.contains("application/json"));

    let full_body = raw.text().await.map_err(Error::Http)?;
    let body = if is_json {
        serde_json::from_str(&full_body).unwrap_or(Value::String(full_body.clone()))
    } else {
        Value::String(full_body.clone())
    };

    Ok(Response {
        status,
        headers,
        body,
        full_body,
    })
}
