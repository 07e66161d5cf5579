//! Manifest module
//!
//! Parse extraction manifests from JSON or YAML files.
//!
//! # Overview
//!
//! The manifest module provides:
//! - `Manifest` - Declarative extraction specification
//! - `RequestDef` / `DependencyDef` / `DatasetDef` - the request graph
//! - Parsing with validation

mod parser;
mod types;

pub use parser::{load_manifest, load_manifest_from_str};
pub use types::{
    ConditionDef, ConditionSet, ConfigField, DatasetDef, DependencyDef, LoadType, Manifest,
    RequestDef, SelectDef, SelectType, TransformerDef, OAUTH2_FUNCTION,
};
