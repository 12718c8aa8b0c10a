//! Session store contract and in-memory backend
//!
//! The store is the single source of truth for live sessions. Every verify
//! and refresh consults it; nothing is cached in-process. Entries disappear
//! only through their TTL.
//!
//! Uses `Pin<Box<dyn Future>>` return types so the manager can hold an
//! `Arc<dyn SessionStore>` and swap the REST backend for the in-memory one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The key is absent or its TTL has lapsed.
    #[error("key not found")]
    KeyNotFound,

    /// Transport, auth or protocol failure talking to the backend.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write was asked to store an entry with no lifetime.
    #[error("ttl must be positive")]
    ZeroTtl,
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Whole seconds of expiry for `ttl`, rounded up so a sub-second TTL still
/// expires. Every entry carries an expiry; a zero TTL is rejected.
pub fn expiry_secs(ttl: Duration) -> StoreResult<u64> {
    if ttl.is_zero() {
        return Err(StoreError::ZeroTtl);
    }
    let secs = ttl.as_secs();
    Ok(if ttl.subsec_nanos() > 0 { secs + 1 } else { secs })
}

/// TTL-capable key-value store.
///
/// Per-key operations are atomic; nothing spans keys.
pub trait SessionStore: Send + Sync {
    /// Write `value` under `key`, expiring after `ttl` rounded up to whole
    /// seconds. A zero `ttl` fails with `ZeroTtl`.
    fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;

    /// Read the value under `key`. Absent or expired keys yield `KeyNotFound`.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, String>;

    /// Remove `key`. Succeeds whether or not the key existed; the returned
    /// flag reports whether a live entry was actually removed, which is what
    /// makes single-use consumption race-free.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// Whether a live entry exists under `key`, without transferring it.
    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory store for local development and tests.
///
/// Expired entries are evicted lazily when touched. Uses `tokio::time::Instant`
/// so tests can drive expiry with a paused clock.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining lifetime of `key`, if it is live.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at - now)
    }

    /// Live keys starting with `prefix`.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl SessionStore for MemoryStore {
    fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let secs = expiry_secs(ttl)?;
            let expires_at = Instant::now() + Duration::from_secs(secs);
            let mut entries = self.entries.lock().await;
            entries.insert(
                key.to_owned(),
                Entry {
                    value: value.to_owned(),
                    expires_at,
                },
            );
            debug!(ttl_secs = secs, "memory store set");
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, String> {
        Box::pin(async move {
            let now = Instant::now();
            let mut entries = self.entries.lock().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => Ok(entry.value.clone()),
                Some(_) => {
                    entries.remove(key);
                    Err(StoreError::KeyNotFound)
                }
                None => Err(StoreError::KeyNotFound),
            }
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            let mut entries = self.entries.lock().await;
            Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            let entries = self.entries.lock().await;
            Ok(entries.get(key).is_some_and(|e| e.is_live(now)))
        })
    }
}
