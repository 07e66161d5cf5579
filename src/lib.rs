// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # precog-extract
//!
//! A declarative API-extraction engine. A manifest describes a collection
//! of HTTP requests, the data dependencies between them, authentication,
//! and output groupings; the engine orchestrates the traffic and writes one
//! JSON record set per dataset.
//!
//! ## Features
//!
//! - **Graph-driven orchestration**: dependency edges extract values from
//!   prior responses and fan requests out over their cartesian product
//! - **Expression DSL**: conditions, computed values, and `{{...}}` string
//!   interpolation
//! - **Transformer pipelines**: header injection plus retry / reauth / fail
//!   response classification per request
//! - **Interactive OAuth2**: authorization-code flow with a local callback
//!   listener and CSRF state
//! - **Durable auth state**: tokens and marked values persisted per
//!   manifest identity
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use precog_extract::engine::Executor;
//! use precog_extract::http::HttpClient;
//! use precog_extract::manifest::load_manifest;
//! use precog_extract::oauth::OAuth2Coordinator;
//! use precog_extract::store::TokenStore;
//!
//! #[tokio::main]
//! async fn main() -> precog_extract::Result<()> {
//!     let manifest = load_manifest("manifest.json")?;
//!     let store = TokenStore::new(&manifest.id);
//!     let mut executor = Executor::new(
//!         &manifest,
//!         Default::default(),
//!         store,
//!         HttpClient::new()?,
//!         OAuth2Coordinator::new(3000),
//!     );
//!     let summary = executor.run("./output").await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the engine
pub mod error;

/// Common types shared across the engine
pub mod types;

/// Request contexts and variable resolution
pub mod context;

/// Manifest data model and loader
pub mod manifest;

/// Expression DSL evaluator
pub mod expr;

/// `{{...}}` template interpolation
pub mod template;

/// Durable auth state per manifest identity
pub mod store;

/// Transformer pipeline: header injection and response classification
pub mod transform;

/// HTTP client driven by the transformer pipeline
pub mod http;

/// Interactive OAuth2 authorization-code flow
pub mod oauth;

/// Dependency resolution and context fan-out
pub mod resolver;

/// Execution engine
pub mod engine;

/// Dataset aggregation and file output
pub mod output;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use manifest::{load_manifest, load_manifest_from_str, Manifest};
pub use types::{Response, ResponseHistory};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
