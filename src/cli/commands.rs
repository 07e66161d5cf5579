//! CLI commands and argument parsing

use crate::oauth::DEFAULT_REDIRECT_PORT;
use clap::Parser;
use std::path::PathBuf;

/// Declarative API-extraction engine
#[derive(Parser, Debug)]
#[command(name = "precog-extract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Manifest file (JSON or YAML)
    pub manifest: PathBuf,

    /// Output directory for dataset files
    pub output_dir: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Port for the OAuth2 callback listener
    #[arg(long, default_value_t = DEFAULT_REDIRECT_PORT)]
    pub redirect_port: u16,

    /// Override the derived OAuth2 redirect URI
    #[arg(long)]
    pub redirect_uri: Option<String>,

    /// Clear persisted auth state and re-authorize
    #[arg(long)]
    pub force_reauth: bool,
}
