//! Shared types for the status viewer gateway
//!
//! Holds the pieces every crate in the workspace needs: a redacting
//! `Secret` wrapper for credentials and signing keys, secret resolution
//! from env vars or files, and the configuration error type.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, resolve_secret};
