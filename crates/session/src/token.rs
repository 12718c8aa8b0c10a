//! Signed token codec
//!
//! Issues and validates the two stateless tokens handed to the extension:
//! a short-lived access token naming a session, and a long-lived refresh
//! token naming a refresh token id and its session. Both are HMAC-signed
//! JWTs carrying `iss`, `iat` and `exp`.
//!
//! Validation order:
//! 1. The header's advertised `alg` must be an HMAC variant. Anything else is
//!    rejected before the signature is looked at.
//! 2. Signature, issuer and expiry are checked by `jsonwebtoken` with zero
//!    leeway.
//! 3. The payload must deserialize into exactly the expected claims shape.
//!    Unknown fields are rejected, so a refresh token never passes as an
//!    access token or vice versa.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ACCESS_TOKEN_TTL, DEFAULT_REFRESH_TOKEN_TTL, TOKEN_ISSUER};
use crate::error::{Error, Result};

/// Algorithm used when issuing tokens.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Algorithms accepted when validating. Symmetric HMAC only.
const ACCEPTED_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claims signed into an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessClaims {
    pub session_id: String,
    pub iss: String,
    /// Issued-at, unix seconds
    pub iat: u64,
    /// Expires-at, unix seconds
    pub exp: u64,
}

/// Claims signed into a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    pub refresh_token_id: String,
    pub session_id: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// Lifetimes applied at issue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: DEFAULT_ACCESS_TOKEN_TTL,
            refresh: DEFAULT_REFRESH_TOKEN_TTL,
        }
    }
}

/// Stateless HMAC token codec.
///
/// Built once at startup from the signing secret and shared read-only; it
/// holds no mutable state, so concurrent use needs no locking.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetimes: TokenLifetimes,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"[REDACTED]")
            .field("lifetimes", &self.lifetimes)
            .finish()
    }
}

impl TokenCodec {
    /// Build a codec from the signing secret.
    ///
    /// An empty secret is a permanent configuration fault.
    pub fn new(secret: &Secret<String>, lifetimes: TokenLifetimes) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::TokenSigningFailed(
                "signing secret is not configured".into(),
            ));
        }
        let key = secret.expose().as_bytes();

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            lifetimes,
        })
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Claims for a fresh access token: issued now, expiring after the access lifetime.
    pub fn access_claims(&self, session_id: &str) -> AccessClaims {
        let (iat, exp) = window(self.lifetimes.access);
        AccessClaims {
            session_id: session_id.to_owned(),
            iss: TOKEN_ISSUER.to_owned(),
            iat,
            exp,
        }
    }

    /// Claims for a fresh refresh token: issued now, expiring after the refresh lifetime.
    pub fn refresh_claims(&self, refresh_token_id: &str, session_id: &str) -> RefreshClaims {
        let (iat, exp) = window(self.lifetimes.refresh);
        RefreshClaims {
            refresh_token_id: refresh_token_id.to_owned(),
            session_id: session_id.to_owned(),
            iss: TOKEN_ISSUER.to_owned(),
            iat,
            exp,
        }
    }

    pub fn issue_access_token(&self, session_id: &str) -> Result<String> {
        self.sign(&self.access_claims(session_id))
    }

    pub fn issue_refresh_token(&self, refresh_token_id: &str, session_id: &str) -> Result<String> {
        self.sign(&self.refresh_claims(refresh_token_id, session_id))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims> {
        self.verify(token)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims> {
        self.verify(token)
    }

    /// Sign an arbitrary claims payload with the configured key.
    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String> {
        jsonwebtoken::encode(&Header::new(SIGNING_ALGORITHM), claims, &self.encoding)
            .map_err(|e| Error::TokenSigningFailed(e.to_string()))
    }

    /// Validate `token` and decode it into the expected claims shape `C`.
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C> {
        let alg = advertised_algorithm(token)?;
        if !matches!(alg.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(Error::UnexpectedSigningAlgorithm(alg));
        }

        jsonwebtoken::decode::<C>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(classify_jwt_error)
    }
}

/// `(iat, exp)` for a token issued now with the given lifetime.
fn window(ttl: Duration) -> (u64, u64) {
    let now = jsonwebtoken::get_current_timestamp();
    (now, now + ttl.as_secs())
}

/// Read the `alg` from the token header without trusting anything else in it.
fn advertised_algorithm(token: &str) -> Result<String> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments[0].is_empty() {
        return Err(Error::TokenMalformed(format!(
            "expected 3 dot-separated segments, got {}",
            segments.len()
        )));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|e| Error::TokenMalformed(format!("header is not base64url: {e}")))?;
    let header: serde_json::Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| Error::TokenMalformed(format!("header is not JSON: {e}")))?;

    header
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| Error::TokenMalformed("header has no alg".into()))
}

fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> Error {
    match err.kind() {
        JwtErrorKind::ExpiredSignature => Error::TokenExpired,
        JwtErrorKind::InvalidAlgorithm | JwtErrorKind::MissingAlgorithm => {
            Error::UnexpectedSigningAlgorithm(err.to_string())
        }
        JwtErrorKind::Json(_) | JwtErrorKind::MissingRequiredClaim(_) => {
            Error::WrongClaimsShape(err.to_string())
        }
        _ => Error::TokenMalformed(err.to_string()),
    }
}
