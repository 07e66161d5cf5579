//! Request contexts
//!
//! A context carries the bindings visible to one request along a traversal
//! path: credentials, current auth state, system variables, and the
//! extracted data accumulated from dependency edges. Contexts are
//! copy-on-extend: a child never mutates its parent, so sibling fan-outs
//! cannot alias each other's bindings.

use crate::store::AuthState;
use serde_json::Value;
use std::collections::HashMap;

/// Reserved system-variable names, resolved before any user binding
pub mod system {
    /// CSRF state generated for the OAuth2 authorize leg
    pub const PRECOG_STATE: &str = "precog_state";
    /// Root URI of the callback listener
    pub const PRECOG_ROOT_URI: &str = "precog_root_uri";
    /// Redirect URI of the callback listener
    pub const PRECOG_REDIRECT_URI: &str = "precog_redirect_uri";
    /// Redirect URI alias used by token-exchange requests
    pub const REDIRECT_URI: &str = "wsk_to_rsk_redirect_uri";
    /// OAuth2 client id, mirrored from the `Client Id` credential
    pub const CLIENT_ID: &str = "wsk_to_rsk_client_id";
    /// OAuth2 client secret, mirrored from the `Client Secret` credential
    pub const CLIENT_SECRET: &str = "wsk_to_rsk_client_secret";
    /// Authorization code captured from the callback
    pub const OAUTH2_CODE: &str = "wsk_to_rsk_oauth2_code";
    /// Current access token, mirrored from auth state
    pub const AUTH_TOKEN: &str = "wsk_to_rsk_auth_token";
    /// Current refresh token, mirrored from auth state
    pub const REFRESH_TOKEN: &str = "wsk_to_rsk_refresh_token";
}

/// Credential field names that back the client id/secret system variables
const CLIENT_ID_FIELD: &str = "Client Id";
const CLIENT_SECRET_FIELD: &str = "Client Secret";

/// The bag of bindings carried along one traversal path
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Credential values, stable across the run
    pub credentials: HashMap<String, String>,
    /// Auth state snapshot, restamped by the executor after edge resolution
    pub auth_state: AuthState,
    /// System variables (redirect URIs, CSRF state, captured code)
    pub system_variables: HashMap<String, String>,
    /// Name -> value bindings accumulated from dependency edges
    pub extracted_data: HashMap<String, Value>,
}

impl RequestContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with credentials and system variables
    pub fn with_credentials(
        credentials: HashMap<String, String>,
        system_variables: HashMap<String, String>,
    ) -> Self {
        Self {
            credentials,
            system_variables,
            ..Self::default()
        }
    }

    /// Resolve a variable name against the context.
    ///
    /// Resolution order, first hit wins: reserved system variables, then
    /// persisted authy values, then extracted data, then credentials. A
    /// reserved name whose backing source is empty falls through. Dotted
    /// names navigate into the resolved value (`response.error`) when no
    /// exact binding exists.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.resolve_exact(name) {
            return Some(value);
        }

        let (root, rest) = name.split_once('.')?;
        let mut current = self.resolve_exact(root)?;
        for part in rest.split('.') {
            current = match &current {
                Value::Object(map) => map.get(part)?.clone(),
                Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?.clone(),
                _ => return None,
            };
        }
        Some(current)
    }

    fn resolve_exact(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.resolve_system(name) {
            return Some(value);
        }

        if let Some(value) = self.auth_state.authy_values.get(name) {
            return Some(value.clone());
        }

        if let Some(value) = self.extracted_data.get(name) {
            return Some(value.clone());
        }

        self.credentials.get(name).cloned().map(Value::String)
    }

    /// Resolve one of the reserved system-variable names
    fn resolve_system(&self, name: &str) -> Option<Value> {
        let resolved = match name {
            system::PRECOG_STATE
            | system::PRECOG_ROOT_URI
            | system::PRECOG_REDIRECT_URI
            | system::REDIRECT_URI
            | system::OAUTH2_CODE => self.system_variables.get(name).cloned(),
            system::CLIENT_ID => self.credentials.get(CLIENT_ID_FIELD).cloned(),
            system::CLIENT_SECRET => self.credentials.get(CLIENT_SECRET_FIELD).cloned(),
            system::AUTH_TOKEN => self.auth_state.access_token.clone(),
            system::REFRESH_TOKEN => self.auth_state.refresh_token.clone(),
            _ => None,
        };
        resolved.map(Value::String)
    }

    /// Whether a name resolves to anything
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Derive a child context with one extra binding
    pub fn child_with(&self, name: impl Into<String>, value: Value) -> Self {
        let mut child = self.clone();
        child.extracted_data.insert(name.into(), value);
        child
    }

    /// Derive a child context with a set of extra bindings
    pub fn child_with_all(&self, bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut child = self.clone();
        child.extracted_data.extend(bindings);
        child
    }
}
