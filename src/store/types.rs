//! Auth state types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Safety margin subtracted from token lifetimes at write time
pub const EXPIRY_MARGIN_SECONDS: i64 = 60;

/// Durable authentication state for one manifest identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    /// Current access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Current refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute instant after which the access token is considered stale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Values flagged `authy` in the manifest, persisted by name
    #[serde(default)]
    pub authy_values: BTreeMap<String, Value>,
}

impl AuthState {
    /// Create an empty auth state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new access token with an optional lifetime in seconds.
    ///
    /// The stored expiry keeps a 60-second safety margin so the token is
    /// refreshed before the server-side deadline.
    pub fn update_access_token(&mut self, token: impl Into<String>, ttl_seconds: Option<i64>) {
        self.access_token = Some(token.into());
        self.expires_at =
            ttl_seconds.map(|ttl| Utc::now() + Duration::seconds(ttl - EXPIRY_MARGIN_SECONDS));
    }

    /// Record a new refresh token
    pub fn update_refresh_token(&mut self, token: impl Into<String>) {
        self.refresh_token = Some(token.into());
    }

    /// True when no access token is present, or the expiry has passed
    pub fn is_token_expired(&self) -> bool {
        match (&self.access_token, &self.expires_at) {
            (None, _) => true,
            (Some(_), Some(expires_at)) => Utc::now() >= *expires_at,
            (Some(_), None) => false,
        }
    }

    /// Whether a refresh token is available
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Fetch a persisted authy value by name
    pub fn authy_value(&self, name: &str) -> Option<&Value> {
        self.authy_values.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_state_is_expired() {
        assert!(AuthState::new().is_token_expired());
    }

    #[test]
    fn test_update_access_token_with_ttl() {
        let mut state = AuthState::new();
        state.update_access_token("tok", Some(3600));
        assert!(!state.is_token_expired());
        assert!(state.expires_at.is_some());
    }

    #[test]
    fn test_short_ttl_expires_immediately() {
        // A margin-sized lifetime leaves no usable window.
        let mut state = AuthState::new();
        state.update_access_token("tok", Some(60));
        assert!(state.is_token_expired());

        state.update_access_token("tok", Some(5));
        assert!(state.is_token_expired());
    }

    #[test]
    fn test_token_without_ttl_never_expires() {
        let mut state = AuthState::new();
        state.update_access_token("tok", None);
        assert!(!state.is_token_expired());
    }

    #[test]
    fn test_roundtrip() {
        let mut state = AuthState::new();
        state.update_access_token("a", Some(3600));
        state.update_refresh_token("r");
        state.authy_values.insert("team_id".into(), json!("t-1"));

        let text = serde_json::to_string(&state).unwrap();
        let loaded: AuthState = serde_json::from_str(&text).unwrap();
        assert_eq!(state, loaded);
        assert!(loaded.has_refresh_token());
        assert_eq!(loaded.authy_value("team_id"), Some(&json!("t-1")));
    }
}
