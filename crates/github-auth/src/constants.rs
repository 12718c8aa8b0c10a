//! GitHub OAuth endpoints and defaults
//!
//! The client id and secret identify a registered OAuth app and come from
//! configuration; nothing here is secret.

use std::time::Duration;

/// Browser-facing authorization endpoint
pub const AUTHORIZE_ENDPOINT: &str = "https://github.com/login/oauth/authorize";

/// Code exchange endpoint
pub const TOKEN_ENDPOINT: &str = "https://github.com/login/oauth/access_token";

/// Scopes needed to read repositories and project boards.
pub const DEFAULT_SCOPE: &str = "repo read:project";

/// Timeout for a single code exchange round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
