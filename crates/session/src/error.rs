//! Error taxonomy for the session lifecycle
//!
//! `Error` carries internal detail for logs. `ErrorKind` is the closed set
//! the transport layer classifies into public responses; the detail never
//! crosses that boundary.

use crate::store::StoreError;

/// Closed set of failure kinds surfaced by the session subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingCredentialSource,
    ExchangeFailed,
    StoreUnavailable,
    IdGenerationFailed,
    TokenSigningFailed,
    TokenMalformed,
    TokenExpired,
    UnexpectedSigningAlgorithm,
    WrongClaimsShape,
    SessionNotFound,
    RefreshTokenRevoked,
    SessionMismatch,
    OAuthStateInvalid,
}

impl ErrorKind {
    /// Stable snake_case label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::MissingCredentialSource => "missing_credential_source",
            ErrorKind::ExchangeFailed => "exchange_failed",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::IdGenerationFailed => "id_generation_failed",
            ErrorKind::TokenSigningFailed => "token_signing_failed",
            ErrorKind::TokenMalformed => "token_malformed",
            ErrorKind::TokenExpired => "token_expired",
            ErrorKind::UnexpectedSigningAlgorithm => "unexpected_signing_algorithm",
            ErrorKind::WrongClaimsShape => "wrong_claims_shape",
            ErrorKind::SessionNotFound => "session_not_found",
            ErrorKind::RefreshTokenRevoked => "refresh_token_revoked",
            ErrorKind::SessionMismatch => "session_mismatch",
            ErrorKind::OAuthStateInvalid => "oauth_state_invalid",
        }
    }

    /// Kinds that are logged as security events for audit.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            ErrorKind::RefreshTokenRevoked
                | ErrorKind::SessionMismatch
                | ErrorKind::OAuthStateInvalid
        )
    }
}

/// Errors from session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing credential source: {0}")]
    MissingCredentialSource(String),

    #[error("code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("identifier generation failed: {0}")]
    IdGenerationFailed(String),

    #[error("token signing failed: {0}")]
    TokenSigningFailed(String),

    #[error("token malformed: {0}")]
    TokenMalformed(String),

    #[error("token expired")]
    TokenExpired,

    #[error("unexpected signing algorithm: {0}")]
    UnexpectedSigningAlgorithm(String),

    #[error("token claims have the wrong shape: {0}")]
    WrongClaimsShape(String),

    #[error("session not found")]
    SessionNotFound,

    #[error("refresh token revoked or expired")]
    RefreshTokenRevoked,

    #[error("session mismatch: token claims {claimed}, store holds {stored}")]
    SessionMismatch { claimed: String, stored: String },

    #[error("oauth state invalid: {0}")]
    OAuthStateInvalid(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingCredentialSource(_) => ErrorKind::MissingCredentialSource,
            Error::ExchangeFailed(_) => ErrorKind::ExchangeFailed,
            Error::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Error::IdGenerationFailed(_) => ErrorKind::IdGenerationFailed,
            Error::TokenSigningFailed(_) => ErrorKind::TokenSigningFailed,
            Error::TokenMalformed(_) => ErrorKind::TokenMalformed,
            Error::TokenExpired => ErrorKind::TokenExpired,
            Error::UnexpectedSigningAlgorithm(_) => ErrorKind::UnexpectedSigningAlgorithm,
            Error::WrongClaimsShape(_) => ErrorKind::WrongClaimsShape,
            Error::SessionNotFound => ErrorKind::SessionNotFound,
            Error::RefreshTokenRevoked => ErrorKind::RefreshTokenRevoked,
            Error::SessionMismatch { .. } => ErrorKind::SessionMismatch,
            Error::OAuthStateInvalid(_) => ErrorKind::OAuthStateInvalid,
        }
    }
}

/// A missing key surfaces as `SessionNotFound` by default; rotation and
/// state redemption match on `KeyNotFound` themselves where it means
/// something else.
impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::KeyNotFound => Error::SessionNotFound,
            StoreError::Unavailable(msg) => Error::StoreUnavailable(msg),
            StoreError::ZeroTtl => Error::StoreUnavailable("ttl must be positive".into()),
        }
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
