//! Command-line interface

mod commands;
mod runner;

pub use commands::Cli;
pub use runner::{
    env_var_name, load_credentials, CredentialValidator, RequiredFieldsValidator, Runner,
};
