//! HTTP module
//!
//! A thin client over reqwest that executes one declared request at a time,
//! driven by the transformer pipeline's classifications.

mod client;

pub use client::{HttpClient, HttpOutcome};

#[cfg(test)]
mod tests;
