//! Error types for GitHub OAuth operations

/// Errors from GitHub OAuth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// GitHub answered with an OAuth error body (it does so with status 200).
    #[error("GitHub rejected the code: {error}: {description}")]
    Rejected { error: String, description: String },

    #[error("invalid OAuth client configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias for GitHub OAuth operations.
pub type Result<T> = std::result::Result<T, Error>;
