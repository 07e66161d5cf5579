//! Transformer pipeline
//!
//! Applies the transformers a request names, in order: header injection on
//! the way out, and retry / reauth / fail classification of the response on
//! the way back.
//!
//! # Overview
//!
//! The transform module provides:
//! - `Pipeline` - the ordered transformer list for one request
//! - `RetryDecision` - retry verdict with backoff delay

mod pipeline;

pub use pipeline::{FailVerdict, Pipeline, RetryDecision};
