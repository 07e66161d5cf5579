//! Common types shared across the engine

use serde_json::Value;
use std::collections::HashMap;

/// A single HTTP response observed during a run.
///
/// `body` holds the parsed JSON document when the response carried
/// `application/json`, otherwise the raw text as a JSON string. `full_body`
/// always retains the raw text.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers (lowercased names)
    pub headers: HashMap<String, String>,
    /// Parsed body
    pub body: Value,
    /// Raw body text
    pub full_body: String,
}

impl Response {
    /// Build a synthetic in-process response, e.g. the OAuth2 callback
    /// result that `select` paths like `$.query.code` bind to.
    pub fn synthetic(status: u16, body: Value) -> Self {
        let full_body = body.to_string();
        Self {
            status,
            headers: HashMap::new(),
            body,
            full_body,
        }
    }
}

/// Append-only record of responses keyed by request name.
///
/// The executor appends every successful response; the resolver reads them
/// back when extracting values for dependency edges.
#[derive(Debug, Clone, Default)]
pub struct ResponseHistory {
    responses: HashMap<String, Vec<Response>>,
}

impl ResponseHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response under the given request name
    pub fn push(&mut self, name: impl Into<String>, response: Response) {
        self.responses.entry(name.into()).or_default().push(response);
    }

    /// All responses recorded for a request name
    pub fn get(&self, name: &str) -> &[Response] {
        self.responses.get(name).map_or(&[], Vec::as_slice)
    }

    /// The most recent response recorded for a request name
    pub fn latest(&self, name: &str) -> Option<&Response> {
        self.responses.get(name).and_then(|v| v.last())
    }
}
