//! GitHub OAuth client
//!
//! Authorization URL construction and authorization code exchange for a
//! GitHub OAuth app. Standalone apart from the `CodeExchanger` contract it
//! implements for the session manager.
//!
//! Flow:
//! 1. Gateway issues a state and returns `GitHubOAuthClient::authorization_url()`
//! 2. User authorizes on github.com and is redirected back with `code` and `state`
//! 3. Session manager calls `CodeExchanger::exchange_code()` with the code
//! 4. The resulting access token is stored server-side under a new session

pub mod authorize;
pub mod client;
pub mod constants;
pub mod error;
pub mod token;

pub use authorize::build_authorization_url;
pub use client::GitHubOAuthClient;
pub use constants::*;
pub use error::{Error, Result};
pub use token::{ExchangeRequest, TokenResponse, exchange_code};
