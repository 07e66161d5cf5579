//! Token store implementation
//!
//! Provides file-based auth state persistence with atomic writes. One
//! document per manifest id under `.credentials/`.

use super::types::AuthState;
use crate::error::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Default directory for persisted auth state
pub const CREDENTIALS_DIR: &str = ".credentials";

/// Token store keyed by manifest id
#[derive(Debug, Clone)]
pub struct TokenStore {
    /// Directory holding one `<manifest-id>.json` per manifest
    dir: PathBuf,
    /// Manifest identity
    manifest_id: String,
}

impl TokenStore {
    /// Create a store rooted at `.credentials/` in the working directory
    pub fn new(manifest_id: impl Into<String>) -> Self {
        Self::with_dir(CREDENTIALS_DIR, manifest_id)
    }

    /// Create a store rooted at a specific directory
    pub fn with_dir(dir: impl AsRef<Path>, manifest_id: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            manifest_id: manifest_id.into(),
        }
    }

    /// Path of the persisted document
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.manifest_id))
    }

    /// Load the persisted auth state; absence reads as empty
    pub async fn load(&self) -> Result<AuthState> {
        let path = self.path();
        if !path.exists() {
            return Ok(AuthState::new());
        }

        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::store(format!("Failed to read auth state file: {e}"))
        })?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::store(format!("Failed to parse auth state file: {e}")))
    }

    /// Persist the auth state atomically (write then swap into place)
    pub async fn save(&self, state: &AuthState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::store(format!("Failed to create credentials directory: {e}"))
        })?;

        let contents = serde_json::to_string_pretty(state)
            .map_err(|e| Error::store(format!("Failed to serialize auth state: {e}")))?;

        let path = self.path();
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::store(format!("Failed to write auth state file: {e}")))?;

        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Error::store(format!("Failed to rename auth state file: {e}")))?;

        Ok(())
    }

    /// Remove the persisted document, if present
    pub async fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| Error::store(format!("Failed to clear auth state: {e}")))?;
        }
        Ok(())
    }

    /// Persist one authy value, preserving all other fields (read-modify-write)
    pub async fn save_authy_value(&self, name: &str, value: Value) -> Result<()> {
        let mut state = self.load().await?;
        state.authy_values.insert(name.to_string(), value);
        self.save(&state).await
    }

    /// Fetch one persisted authy value
    pub async fn get_authy_value(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.load().await?.authy_values.get(name).cloned())
    }

    /// Record a new access token; `ttl_seconds` keeps the 60 s safety margin
    pub async fn update_access_token(
        &self,
        token: &str,
        ttl_seconds: Option<i64>,
    ) -> Result<()> {
        let mut state = self.load().await?;
        state.update_access_token(token, ttl_seconds);
        self.save(&state).await
    }

    /// Record a new refresh token, preserving all other fields
    pub async fn update_refresh_token(&self, token: &str) -> Result<()> {
        let mut state = self.load().await?;
        state.update_refresh_token(token);
        self.save(&state).await
    }

    /// Whether the persisted access token is missing or stale
    pub async fn is_token_expired(&self) -> Result<bool> {
        Ok(self.load().await?.is_token_expired())
    }

    /// Whether a refresh token is persisted
    pub async fn has_refresh_token(&self) -> Result<bool> {
        Ok(self.load().await?.has_refresh_token())
    }
}
