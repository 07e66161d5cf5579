//! Manifest loader
//!
//! Parses and validates extraction manifests. Manifests are JSON or YAML
//! documents; a single YAML parser covers both on-disk formats.

use crate::error::{Error, Result};
use crate::manifest::types::Manifest;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Load a manifest from a file path
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Manifest> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::manifest(format!(
            "Failed to read manifest file '{}': {}",
            path.display(),
            e
        ))
    })?;
    load_manifest_from_str(&content)
}

/// Load a manifest from a JSON or YAML string
pub fn load_manifest_from_str(content: &str) -> Result<Manifest> {
    let manifest: Manifest = serde_yaml::from_str(content)
        .map_err(|e| Error::manifest(format!("Failed to parse manifest: {e}")))?;

    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Validate a manifest
fn validate_manifest(manifest: &Manifest) -> Result<()> {
    if manifest.id.is_empty() {
        return Err(Error::missing_field("id"));
    }

    if manifest.reqs.is_empty() {
        return Err(Error::missing_field("reqs"));
    }

    let request_names: HashSet<_> = manifest.reqs.iter().map(|r| r.name.as_str()).collect();
    if request_names.len() != manifest.reqs.len() {
        return Err(Error::manifest("Duplicate request names found"));
    }

    let transformer_names: HashSet<_> =
        manifest.transformers.iter().map(|t| t.name.as_str()).collect();
    if transformer_names.len() != manifest.transformers.len() {
        return Err(Error::manifest("Duplicate transformer names found"));
    }

    for req in &manifest.reqs {
        if req.name.is_empty() {
            return Err(Error::manifest("Request name cannot be empty"));
        }

        if let Some(method) = &req.method {
            let valid_methods = ["GET", "POST", "PUT", "PATCH", "DELETE"];
            if !valid_methods.contains(&method.to_uppercase().as_str()) {
                return Err(Error::manifest(format!(
                    "Request '{}' has invalid HTTP method: {method}",
                    req.name
                )));
            }
        }

        for transformer in &req.transformers {
            if !transformer_names.contains(transformer.as_str()) {
                return Err(Error::manifest(format!(
                    "Request '{}' references unknown transformer '{transformer}'",
                    req.name
                )));
            }
        }
    }

    // Edges and datasets may reference names the engine skips at runtime
    // ("env" is the OAuth2 alias; missing targets are skipped), so unknown
    // references warn rather than fail.
    for dep in &manifest.deps {
        for name in dep.from.iter().chain(dep.to.iter()) {
            if name != "env" && !request_names.contains(name.as_str()) {
                warn!("Dependency edge references unknown request '{name}'");
            }
        }

        for select in &dep.select {
            validate_select(select)?;
        }
    }

    for dataset in &manifest.datasets {
        if dataset.name.is_empty() {
            return Err(Error::manifest("Dataset name cannot be empty"));
        }
        for name in &dataset.data {
            if !request_names.contains(name.as_str()) {
                warn!(
                    "Dataset '{}' references unknown request '{name}'",
                    dataset.name
                );
            }
        }
    }

    Ok(())
}

/// Validate a select descriptor: it must be able to produce a value.
fn validate_select(select: &crate::manifest::types::SelectDef) -> Result<()> {
    use crate::manifest::types::SelectType;

    if select.name.is_empty() {
        return Err(Error::manifest("Select name cannot be empty"));
    }

    let derives_value = matches!(
        select.select_type,
        Some(SelectType::Status | SelectType::FullBody)
    );
    if select.path.is_none() && select.expr.is_none() && !derives_value && select.select.is_empty()
    {
        return Err(Error::Select {
            name: select.name.clone(),
            message: "one of path, expr, a derived type, or nested selects is required".into(),
        });
    }

    for nested in &select.select {
        validate_select(nested)?;
    }

    Ok(())
}
