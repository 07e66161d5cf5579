//! OAuth2 module
//!
//! The interactive authorization-code flow: a local callback listener, CSRF
//! state validation, and browser hand-off.

mod coordinator;

pub use coordinator::{BrowserOpener, OAuth2Coordinator, DEFAULT_REDIRECT_PORT};
