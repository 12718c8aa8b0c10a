//! Opaque identifier generation
//!
//! Session ids, refresh token ids and OAuth states are all 32 random bytes
//! from the OS entropy source, hex encoded. Sharing one width keeps the
//! identifier spaces indistinguishable from each other.

use crate::error::{Error, Result};

/// Bytes of entropy in a SessionID.
pub const SESSION_ID_BYTES: usize = 32;

/// Bytes of entropy in a RefreshTokenID.
pub const REFRESH_TOKEN_ID_BYTES: usize = 32;

/// Bytes of entropy in an OAuth state value.
pub const OAUTH_STATE_BYTES: usize = 32;

/// Characters of an identifier shown in logs.
const LOG_PREFIX_LEN: usize = 8;

/// Generate `byte_length` random bytes and hex-encode them.
///
/// The result is `2 * byte_length` lowercase hex characters. Fails with
/// `IdGenerationFailed` if the OS cannot supply entropy; there is no
/// fallback to a weaker source.
pub fn generate(byte_length: usize) -> Result<String> {
    let mut bytes = vec![0u8; byte_length];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| Error::IdGenerationFailed(format!("reading OS entropy: {e}")))?;
    Ok(hex::encode(bytes))
}

pub fn session_id() -> Result<String> {
    generate(SESSION_ID_BYTES)
}

pub fn refresh_token_id() -> Result<String> {
    generate(REFRESH_TOKEN_ID_BYTES)
}

pub fn oauth_state() -> Result<String> {
    generate(OAUTH_STATE_BYTES)
}

/// Whether `value` looks like an identifier minted by [`generate`] with 32 bytes.
pub fn is_opaque_id(value: &str) -> bool {
    value.len() == SESSION_ID_BYTES * 2
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Truncated form of an identifier, safe to put in logs.
pub fn short(id: &str) -> &str {
    match id.char_indices().nth(LOG_PREFIX_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
