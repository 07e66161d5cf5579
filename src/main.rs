//! precog-extract CLI
//!
//! Runs an extraction manifest and writes its datasets.

use clap::Parser;
use precog_extract::cli::{Cli, Runner};
use precog_extract::Error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --debug widens the filter; RUST_LOG still wins when set.
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let runner = Runner::new(cli);
    if let Err(e) = runner.run().await {
        eprintln!("Error: {e}");
        let code = match e {
            Error::Credential { .. } => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}
