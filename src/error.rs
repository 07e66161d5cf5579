//! Error types for the extraction engine
//!
//! This module defines the error hierarchy for the entire engine.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the extraction engine
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Manifest Errors
    // ============================================================================
    #[error("Manifest error: {message}")]
    Manifest { message: String },

    #[error("Missing required manifest field: {field}")]
    MissingManifestField { field: String },

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Credential Errors
    // ============================================================================
    #[error("Missing required credentials: {missing}")]
    Credential { missing: String },

    // ============================================================================
    // Expression Errors
    // ============================================================================
    #[error("Unresolved variable: {variable}")]
    UnresolvedVariable { variable: String },

    #[error("Expression error: {message}")]
    Expression { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {request}: {body}")]
    HttpStatus {
        request: String,
        status: u16,
        body: String,
    },

    #[error("Max attempts ({attempts}) exceeded for {request}: {message}")]
    AttemptsExhausted {
        request: String,
        attempts: u32,
        message: String,
    },

    #[error("Fail condition triggered for {request}: {message}")]
    FailCondition { request: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // OAuth2 Errors
    // ============================================================================
    #[error("OAuth2 error: {message}")]
    OAuth2 { message: String },

    // ============================================================================
    // Selection Errors
    // ============================================================================
    #[error("JSONPath error: {message}")]
    JsonPath { message: String },

    #[error("Invalid select '{name}': {message}")]
    Select { name: String, message: String },

    // ============================================================================
    // Token Store Errors
    // ============================================================================
    #[error("Token store error: {message}")]
    Store { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a manifest error
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    /// Create a missing manifest field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingManifestField {
            field: field.into(),
        }
    }

    /// Create a credential error listing the missing variables
    pub fn credential(missing: impl Into<String>) -> Self {
        Self::Credential {
            missing: missing.into(),
        }
    }

    /// Create an unresolved variable error
    pub fn unresolved(variable: impl Into<String>) -> Self {
        Self::UnresolvedVariable {
            variable: variable.into(),
        }
    }

    /// Create an expression error
    pub fn expression(message: impl Into<String>) -> Self {
        Self::Expression {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(request: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            request: request.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a fail-condition error
    pub fn fail_condition(request: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FailCondition {
            request: request.into(),
            message: message.into(),
        }
    }

    /// Create an OAuth2 error
    pub fn oauth2(message: impl Into<String>) -> Self {
        Self::OAuth2 {
            message: message.into(),
        }
    }

    /// Create a JSONPath error
    pub fn json_path(message: impl Into<String>) -> Self {
        Self::JsonPath {
            message: message.into(),
        }
    }

    /// Create a token store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Whether this error aborts the whole run.
    ///
    /// Per-node failures (HTTP, fail conditions, expressions, selections)
    /// terminate one subtree; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Http(_)
                | Error::HttpStatus { .. }
                | Error::AttemptsExhausted { .. }
                | Error::FailCondition { .. }
                | Error::UnresolvedVariable { .. }
                | Error::Expression { .. }
                | Error::JsonPath { .. }
                | Error::Select { .. }
        )
    }
}

/// Result type alias for the extraction engine
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
