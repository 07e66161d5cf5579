//! Manifest types
//!
//! Declarative extraction manifest types for JSON/YAML parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Manifest
// ============================================================================

/// Top-level extraction manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Stable identity; keys persisted tokens
    pub id: String,
    /// Credential field name -> description/sensitivity
    #[serde(default, rename = "configSchema")]
    pub config_schema: BTreeMap<String, ConfigField>,
    /// Named transformer definitions
    #[serde(default)]
    pub transformers: Vec<TransformerDef>,
    /// Request definitions
    pub reqs: Vec<RequestDef>,
    /// Dependency edges between requests
    #[serde(default)]
    pub deps: Vec<DependencyDef>,
    /// Output dataset groupings
    pub datasets: Vec<DatasetDef>,
}

impl Manifest {
    /// Look up a request definition by name
    pub fn request(&self, name: &str) -> Option<&RequestDef> {
        self.reqs.iter().find(|r| r.name == name)
    }

    /// Look up a transformer definition by name
    pub fn transformer(&self, name: &str) -> Option<&TransformerDef> {
        self.transformers.iter().find(|t| t.name == name)
    }

    /// The request carrying the interactive OAuth2 function marker, if any
    pub fn oauth2_request(&self) -> Option<&RequestDef> {
        self.reqs
            .iter()
            .find(|r| r.function.as_deref() == Some(OAUTH2_FUNCTION))
    }

    /// Whether this manifest requires the interactive OAuth2 sub-flow
    pub fn requires_oauth2(&self) -> bool {
        self.oauth2_request().is_some() || self.reqs.iter().any(|r| r.name == "env")
    }
}

/// Function marker for the interactive authorization-code flow
pub const OAUTH2_FUNCTION: &str = "interactiveOAuth2Authorization";

/// One credential field in the manifest's config schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Sensitive fields are required at runtime
    #[serde(default)]
    pub sensitive: bool,
}

// ============================================================================
// Transformers
// ============================================================================

/// A named bundle of header injections and conditional response policies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerDef {
    /// Transformer name, referenced from requests
    pub name: String,
    /// Headers to inject (values are templates)
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Declared rate limits. Informational only: the engine surfaces them
    /// but honors limits via server-driven retry hints.
    #[serde(default)]
    pub ratelimits: Option<Vec<Value>>,
    /// Conditions that classify a response as retryable
    #[serde(default)]
    pub retrywhere: Option<ConditionSet>,
    /// Conditions that classify a response as a hard failure
    #[serde(default)]
    pub failwhere: Option<ConditionSet>,
    /// Conditions that classify a response as needing re-authentication
    #[serde(default)]
    pub reauthwhere: Option<ConditionSet>,
}

/// A set of response-matching conditions plus retry tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSet {
    /// Conditions checked in order; the first match decides
    #[serde(default)]
    pub conditions: Vec<ConditionDef>,
    /// Attempt ceiling before giving up (retry sets only)
    #[serde(default)]
    pub retries: Option<u32>,
    /// Initial backoff delay in milliseconds (retry sets only)
    #[serde(default)]
    pub initial_delay: Option<u64>,
    /// Backoff cap in milliseconds (retry sets only)
    #[serde(default)]
    pub max_wait: Option<u64>,
}

/// A single response-matching condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDef {
    /// Match when the response status equals this code
    #[serde(default)]
    pub status: Option<u16>,
    /// Match when this expression evaluates truthy against the response
    #[serde(default)]
    pub expr: Option<String>,
    /// Message reported when a fail condition triggers
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Requests
// ============================================================================

/// A declared HTTP request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDef {
    /// Request name, referenced from deps and datasets
    pub name: String,
    /// URL template
    #[serde(default)]
    pub url: Option<String>,
    /// HTTP method (default GET)
    #[serde(default)]
    pub method: Option<String>,
    /// Body template, sent verbatim after interpolation
    #[serde(default)]
    pub body: Option<String>,
    /// Request-level headers (values are templates)
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Names of transformers to apply, in order
    #[serde(default)]
    pub transformers: Vec<String>,
    /// Special-handler marker; only `interactiveOAuth2Authorization` is known
    #[serde(default)]
    pub function: Option<String>,
    /// Arguments for the function handler (values are templates)
    #[serde(default)]
    pub args: Option<HashMap<String, String>>,
    /// Load classification
    #[serde(default)]
    pub loadtype: Option<LoadType>,
}

impl RequestDef {
    /// Effective HTTP method, defaulting to GET
    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("GET")
    }
}

/// Load classification for requests and edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadType {
    /// Full load
    Initial,
    /// Incremental load; filtered out of every run
    Delta,
}

// ============================================================================
// Dependencies
// ============================================================================

/// A dependency edge: extract values from `from` responses, fan out `to`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDef {
    /// Source request names
    pub from: Vec<String>,
    /// Target request names
    pub to: Vec<String>,
    /// Value selections to extract
    #[serde(default)]
    pub select: Vec<SelectDef>,
    /// Gating expression; falsy yields no child contexts
    #[serde(default)]
    pub selectwhere: Option<String>,
    /// Load classification
    #[serde(default)]
    pub loadtype: Option<LoadType>,
}

impl DependencyDef {
    /// Whether this edge drives pagination: a `to` name containing `_paged`
    /// that also appears in `from`.
    pub fn is_pagination(&self) -> bool {
        self.to
            .iter()
            .any(|t| t.contains("_paged") && self.from.contains(t))
    }
}

/// A value selection over a source response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectDef {
    /// Name the extracted values bind to
    pub name: String,
    /// Path query over the response body
    #[serde(default)]
    pub path: Option<String>,
    /// Coercion / derivation type
    #[serde(default, rename = "type")]
    pub select_type: Option<SelectType>,
    /// Expression evaluated in an augmented context
    #[serde(default)]
    pub expr: Option<String>,
    /// Persist the extracted value to the token store
    #[serde(default)]
    pub authy: bool,
    /// Nested selections, visible by name inside `expr`
    #[serde(default)]
    pub select: Vec<SelectDef>,
    /// Truncation byte count for full-body selections
    #[serde(default, rename = "up-to")]
    pub up_to: Option<usize>,
}

/// How a selected value is derived or coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectType {
    /// Coerce matches to strings
    #[serde(rename = "string")]
    String,
    /// Coerce matches to numbers
    #[serde(rename = "number")]
    Number,
    /// Yield the response status code
    #[serde(rename = "status")]
    Status,
    /// Yield the serialized response body
    #[serde(rename = "full-body")]
    FullBody,
}

// ============================================================================
// Datasets
// ============================================================================

/// A named output grouping of request results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDef {
    /// Dataset name; slugified into the output filename
    pub name: String,
    /// Source request names whose outputs compose the dataset
    pub data: Vec<String>,
}
