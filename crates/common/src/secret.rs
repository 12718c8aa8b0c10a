//! Secret wrapper for sensitive values
//!
//! Upstream credentials, signing keys and API tokens all travel inside
//! `Secret` so a stray `{:?}` in a log line prints `[REDACTED]`.

use std::fmt;
use std::path::Path;

use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Sensitive value - redacted in Debug/Display/logs, zeroed on drop
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Whether the wrapped string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Resolve a secret from an env var, falling back to a file.
///
/// Resolution order:
/// 1. `env_var`, if set and non-empty
/// 2. contents of `file`, trimmed
///
/// Returns `Ok(None)` when neither source yields a value. A configured file
/// that cannot be read is an error even if it would otherwise be optional.
pub fn resolve_secret(env_var: &str, file: Option<&Path>) -> Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim().to_owned();
        if !value.is_empty() {
            return Ok(Some(Secret::new(value)));
        }
    }

    let Some(path) = file else {
        return Ok(None);
    };

    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read secret file {} (for {env_var}): {e}",
            path.display()
        ))
    })?;
    let value = contents.trim().to_owned();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Secret::new(value)))
}
