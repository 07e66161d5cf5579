//! CLI runner - wires the manifest, credentials, and collaborators together

use crate::cli::commands::Cli;
use crate::engine::Executor;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::manifest::{load_manifest, Manifest};
use crate::oauth::OAuth2Coordinator;
use crate::store::TokenStore;
use std::collections::HashMap;
use tracing::{debug, info};

/// Validates credentials before execution begins.
///
/// The shipped implementation checks required fields are present and
/// non-empty; deployments can swap in a validator that calls out to an
/// external service.
pub trait CredentialValidator {
    /// Reject the run when credentials are unusable
    fn validate(&self, manifest: &Manifest, credentials: &HashMap<String, String>) -> Result<()>;
}

/// Default validator: required fields must be present and non-empty
pub struct RequiredFieldsValidator;

impl CredentialValidator for RequiredFieldsValidator {
    fn validate(&self, manifest: &Manifest, credentials: &HashMap<String, String>) -> Result<()> {
        let missing: Vec<String> = manifest
            .config_schema
            .iter()
            .filter(|(_, field)| field.sensitive)
            .filter(|(name, _)| {
                credentials
                    .get(name.as_str())
                    .is_none_or(|value| value.is_empty())
            })
            .map(|(name, _)| env_var_name(name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::credential(missing.join(", ")))
        }
    }
}

/// The environment variable a credential field reads from: uppercased, with
/// whitespace runs collapsed to single underscores.
pub fn env_var_name(field: &str) -> String {
    field
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Read credentials for every schema field from the environment
pub fn load_credentials(manifest: &Manifest) -> HashMap<String, String> {
    let mut credentials = HashMap::new();
    for name in manifest.config_schema.keys() {
        if let Ok(value) = std::env::var(env_var_name(name)) {
            credentials.insert(name.clone(), value);
        }
    }
    credentials
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Execute the run described by the CLI arguments
    pub async fn run(&self) -> Result<()> {
        let manifest = load_manifest(&self.cli.manifest)?;
        info!("Loaded manifest '{}'", manifest.id);

        // A local env file augments the environment before credentials are
        // read; absence is not an error.
        if dotenvy::from_filename(".env.local").is_ok() {
            debug!("Loaded .env.local");
        }
        dotenvy::dotenv().ok();

        let credentials = load_credentials(&manifest);
        RequiredFieldsValidator.validate(&manifest, &credentials)?;

        let store = TokenStore::new(&manifest.id);
        let client = HttpClient::new()?;
        let mut coordinator = OAuth2Coordinator::new(self.cli.redirect_port);
        if let Some(uri) = &self.cli.redirect_uri {
            coordinator = coordinator.with_redirect_uri(uri);
        }

        let mut executor = Executor::new(&manifest, credentials, store, client, coordinator)
            .with_force_reauth(self.cli.force_reauth);
        let summary = executor.run(self.cli.output_dir.clone()).await?;

        println!("{summary}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::load_manifest_from_str;

    #[test]
    fn test_env_var_name_mapping() {
        assert_eq!(env_var_name("API Key"), "API_KEY");
        assert_eq!(env_var_name("Client  Secret"), "CLIENT_SECRET");
        assert_eq!(env_var_name("token"), "TOKEN");
    }

    #[test]
    fn test_required_credentials_enforced() {
        let manifest = load_manifest_from_str(
            r#"{
  "id": "t",
  "configSchema": {
    "Api Key": {"description": "key", "sensitive": true},
    "Region": {"description": "optional"}
  },
  "reqs": [{"name": "r", "url": "https://ex/r"}],
  "datasets": []
}"#,
        )
        .unwrap();

        // Only the sensitive field is required.
        let err = RequiredFieldsValidator
            .validate(&manifest, &HashMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("API_KEY"));
        assert!(!err.to_string().contains("REGION"));

        let mut credentials = HashMap::new();
        credentials.insert("Api Key".to_string(), "k".to_string());
        assert!(RequiredFieldsValidator
            .validate(&manifest, &credentials)
            .is_ok());
    }
}
