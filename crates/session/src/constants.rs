//! Session lifecycle constants
//!
//! Key prefixes define the persisted layout in the key-value store. Changing
//! any of them orphans every live session.

use std::time::Duration;

/// Store key prefix for `session:<SessionID>` → upstream credential
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Store key prefix for `refresh_token:<RefreshTokenID>` → SessionID
pub const REFRESH_TOKEN_KEY_PREFIX: &str = "refresh_token:";

/// Store key prefix for pending OAuth `state` values
pub const OAUTH_STATE_KEY_PREFIX: &str = "oauth_state:";

/// Value stored under a pending OAuth state key
pub const OAUTH_STATE_PENDING: &str = "pending";

/// Issuer claim stamped into every signed token
pub const TOKEN_ISSUER: &str = "github-project-status-viewer";

/// Access tokens are checked on every call; keep them short-lived.
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Refresh tokens are individually revocable through the store.
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Lifetime of the `session:<id>` store entry.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// How long an issued OAuth state stays redeemable.
pub const OAUTH_STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Per-command timeout for the REST key-value backend.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the store key holding a session's upstream credential.
pub fn session_key(session_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{session_id}")
}

/// Build the store key mapping a refresh token id to its session.
pub fn refresh_token_key(refresh_token_id: &str) -> String {
    format!("{REFRESH_TOKEN_KEY_PREFIX}{refresh_token_id}")
}

/// Build the store key for a pending OAuth state.
pub fn oauth_state_key(state: &str) -> String {
    format!("{OAUTH_STATE_KEY_PREFIX}{state}")
}
