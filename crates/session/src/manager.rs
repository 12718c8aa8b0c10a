//! Session lifecycle manager
//!
//! Orchestrates the OAuth callback, session verification and refresh token
//! rotation on top of the token codec, the store and the code exchanger.
//! Holds no mutable state of its own: every decision is made against the
//! store, so any number of instances can serve the same sessions.
//!
//! Persisted layout:
//! - `session:<SessionID>` → upstream credential (session TTL)
//! - `refresh_token:<RefreshTokenID>` → SessionID (refresh TTL)
//! - `oauth_state:<state>` → `"pending"` (10 minutes)
//!
//! No step is rolled back on failure. A rotation that fails after consuming
//! the old refresh token leaves the session without a usable refresh token,
//! and the client must authenticate again.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::constants::{
    DEFAULT_SESSION_TTL, OAUTH_STATE_PENDING, OAUTH_STATE_TTL, oauth_state_key, refresh_token_key,
    session_key,
};
use crate::error::{Error, Result};
use crate::exchange::{CodeExchanger, UpstreamCredential};
use crate::ids;
use crate::store::{SessionStore, StoreError};
use crate::token::TokenCodec;

/// Access and refresh token handed to the client.
#[derive(Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// A freshly issued, not yet redeemed OAuth `state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub state: String,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    exchanger: Arc<dyn CodeExchanger>,
    codec: TokenCodec,
    session_ttl: Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        exchanger: Arc<dyn CodeExchanger>,
        codec: TokenCodec,
    ) -> Self {
        Self {
            store,
            exchanger,
            codec,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Override the lifetime of `session:<id>` entries.
    pub fn with_session_ttl(mut self, session_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Issue a single-use OAuth `state` and record it as pending.
    #[instrument(skip_all)]
    pub async fn begin_authorization(&self) -> Result<AuthorizationRequest> {
        let state = ids::oauth_state()?;
        self.store
            .set(&oauth_state_key(&state), OAUTH_STATE_PENDING, OAUTH_STATE_TTL)
            .await?;
        info!(state = ids::short(&state), "oauth state issued");
        Ok(AuthorizationRequest { state })
    }

    /// Redeem an OAuth `state` issued by [`begin_authorization`](Self::begin_authorization).
    ///
    /// Redemption is a conditional delete: of two concurrent callbacks
    /// presenting the same state, only the one that removes it proceeds.
    #[instrument(skip_all)]
    pub async fn consume_oauth_state(&self, state: &str) -> Result<()> {
        if state.is_empty() {
            return Err(Error::MissingCredentialSource(
                "missing state parameter".into(),
            ));
        }
        if !ids::is_opaque_id(state) {
            warn!(
                security_event = "oauth_state_invalid",
                "oauth state has unexpected format"
            );
            return Err(Error::OAuthStateInvalid("unexpected format".into()));
        }

        if !self.store.delete(&oauth_state_key(state)).await? {
            warn!(
                security_event = "oauth_state_invalid",
                state = ids::short(state),
                "oauth state unknown, expired or already used"
            );
            return Err(Error::OAuthStateInvalid(
                "unknown, expired or already used".into(),
            ));
        }
        Ok(())
    }

    /// Trade an authorization code for a new session and its first token pair.
    ///
    /// Steps: exchange the code, mint a SessionID, store the credential under
    /// it, then mint the refresh token id and issue both tokens. Any failure
    /// aborts without returning tokens.
    #[instrument(skip_all)]
    pub async fn complete_oauth_callback(&self, code: &str) -> Result<TokenPair> {
        if code.is_empty() {
            return Err(Error::MissingCredentialSource(
                "missing authorization code".into(),
            ));
        }

        let credential = self.exchanger.exchange_code(code).await?;

        let session_id = ids::session_id()?;
        self.store
            .set(
                &session_key(&session_id),
                credential.expose(),
                self.session_ttl,
            )
            .await?;

        let pair = self.mint_token_pair(&session_id).await?;
        info!(session = ids::short(&session_id), "session created");
        Ok(pair)
    }

    /// Resolve an access token to the upstream credential of its session.
    #[instrument(skip_all)]
    pub async fn verify_session(&self, access_token: &str) -> Result<UpstreamCredential> {
        let claims = self.codec.verify_access_token(access_token)?;

        match self.store.get(&session_key(&claims.session_id)).await {
            Ok(credential) => Ok(UpstreamCredential::new(credential)),
            Err(StoreError::KeyNotFound) => {
                info!(
                    session = ids::short(&claims.session_id),
                    "access token references an expired session"
                );
                Err(Error::SessionNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Exchange a refresh token for a fresh pair, consuming it.
    ///
    /// After success exactly one of the presented and the returned refresh
    /// tokens is valid. Concurrent presentations of the same token race on
    /// the conditional delete, and only the winner mints a replacement.
    #[instrument(skip_all)]
    pub async fn rotate_refresh_token(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.codec.verify_refresh_token(refresh_token)?;
        let old_key = refresh_token_key(&claims.refresh_token_id);

        let stored_session_id = match self.store.get(&old_key).await {
            Ok(session_id) => session_id,
            Err(StoreError::KeyNotFound) => {
                warn!(
                    security_event = "refresh_token_revoked",
                    refresh_token = ids::short(&claims.refresh_token_id),
                    session = ids::short(&claims.session_id),
                    "refresh token already used or unknown"
                );
                return Err(Error::RefreshTokenRevoked);
            }
            Err(e) => return Err(e.into()),
        };

        if stored_session_id != claims.session_id {
            warn!(
                security_event = "session_mismatch",
                refresh_token = ids::short(&claims.refresh_token_id),
                claimed = ids::short(&claims.session_id),
                stored = ids::short(&stored_session_id),
                "refresh token names a different session than the store"
            );
            return Err(Error::SessionMismatch {
                claimed: claims.session_id,
                stored: stored_session_id,
            });
        }

        if !self.store.exists(&session_key(&claims.session_id)).await? {
            info!(
                session = ids::short(&claims.session_id),
                "refresh token outlived its session"
            );
            return Err(Error::SessionNotFound);
        }

        if !self.store.delete(&old_key).await? {
            warn!(
                security_event = "rotation_race_lost",
                refresh_token = ids::short(&claims.refresh_token_id),
                session = ids::short(&claims.session_id),
                "refresh token consumed by a concurrent rotation"
            );
            return Err(Error::RefreshTokenRevoked);
        }

        let pair = self.mint_token_pair(&claims.session_id).await?;
        info!(session = ids::short(&claims.session_id), "refresh token rotated");
        Ok(pair)
    }

    /// Mint a refresh token id for `session_id`, record it, and issue both tokens.
    async fn mint_token_pair(&self, session_id: &str) -> Result<TokenPair> {
        let refresh_token_id = ids::refresh_token_id()?;
        self.store
            .set(
                &refresh_token_key(&refresh_token_id),
                session_id,
                self.codec.lifetimes().refresh,
            )
            .await?;

        Ok(TokenPair {
            access_token: self.codec.issue_access_token(session_id)?,
            refresh_token: self.codec.issue_refresh_token(&refresh_token_id, session_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::exchange::ExchangeFuture;
    use crate::store::{MemoryStore, StoreFuture};
    use crate::token::TokenLifetimes;
    use common::Secret;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    const SECRET: &str = "test-signing-secret-with-enough-length";

    /// Exchanger that accepts exactly one code.
    struct StubExchanger {
        calls: AtomicUsize,
    }

    impl StubExchanger {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CodeExchanger for StubExchanger {
        fn exchange_code<'a>(&'a self, code: &'a str) -> ExchangeFuture<'a> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if code == "valid-code" {
                    Ok(Secret::new("gho_abc".to_owned()))
                } else {
                    Err(Error::ExchangeFailed("bad_verification_code".into()))
                }
            })
        }
    }

    /// Wraps a MemoryStore and fails refresh token writes on demand.
    struct FlakyStore {
        inner: MemoryStore,
        fail_refresh_sets: AtomicBool,
    }

    impl SessionStore for FlakyStore {
        fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
            if self.fail_refresh_sets.load(Ordering::SeqCst) && key.starts_with("refresh_token:") {
                return Box::pin(async { Err(StoreError::Unavailable("write timed out".into())) });
            }
            self.inner.set(key, value, ttl)
        }
        fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, String> {
            self.inner.get(key)
        }
        fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
            self.inner.delete(key)
        }
        fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
            self.inner.exists(key)
        }
    }

    /// Holds every `exists` call until two callers have arrived, so both
    /// rotations pass the existence check before either deletes.
    struct GatedStore {
        inner: MemoryStore,
        gate: Barrier,
    }

    impl SessionStore for GatedStore {
        fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
            self.inner.set(key, value, ttl)
        }
        fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, String> {
            self.inner.get(key)
        }
        fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
            self.inner.delete(key)
        }
        fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async move {
                self.gate.wait().await;
                self.inner.exists(key).await
            })
        }
    }

    /// Store whose backend is unreachable.
    struct DownStore;

    impl SessionStore for DownStore {
        fn set<'a>(&'a self, _: &'a str, _: &'a str, _: Duration) -> StoreFuture<'a, ()> {
            Box::pin(async { Err(StoreError::Unavailable("connection refused".into())) })
        }
        fn get<'a>(&'a self, _: &'a str) -> StoreFuture<'a, String> {
            Box::pin(async { Err(StoreError::Unavailable("connection refused".into())) })
        }
        fn delete<'a>(&'a self, _: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async { Err(StoreError::Unavailable("connection refused".into())) })
        }
        fn exists<'a>(&'a self, _: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async { Err(StoreError::Unavailable("connection refused".into())) })
        }
    }

    /// Wraps a MemoryStore and fails every read once the backend "goes down".
    struct OutageStore {
        inner: MemoryStore,
        reads_down: AtomicBool,
    }

    impl SessionStore for OutageStore {
        fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
            self.inner.set(key, value, ttl)
        }
        fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, String> {
            if self.reads_down.load(Ordering::SeqCst) {
                return Box::pin(async { Err(StoreError::Unavailable("read timed out".into())) });
            }
            self.inner.get(key)
        }
        fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
            self.inner.delete(key)
        }
        fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
            self.inner.exists(key)
        }
    }

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&Secret::new(secret.to_owned()), TokenLifetimes::default()).unwrap()
    }

    fn manager_with(store: Arc<dyn SessionStore>) -> SessionManager {
        SessionManager::new(store, Arc::new(StubExchanger::new()), codec(SECRET))
    }

    fn memory_manager() -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (manager_with(store.clone()), store)
    }

    #[tokio::test]
    async fn callback_creates_session_and_tokens() {
        let (manager, store) = memory_manager();

        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();

        let claims = manager.codec().verify_access_token(&pair.access_token).unwrap();
        assert!(ids::is_opaque_id(&claims.session_id));
        assert_eq!(
            store.get(&session_key(&claims.session_id)).await.unwrap(),
            "gho_abc"
        );

        let ttl = store.ttl(&session_key(&claims.session_id)).await.unwrap();
        let thirty_days = Duration::from_secs(30 * 24 * 3600);
        assert!(ttl <= thirty_days && ttl > thirty_days - Duration::from_secs(5));

        let refresh = manager
            .codec()
            .verify_refresh_token(&pair.refresh_token)
            .unwrap();
        assert_eq!(refresh.session_id, claims.session_id);
        assert_eq!(
            store
                .get(&refresh_token_key(&refresh.refresh_token_id))
                .await
                .unwrap(),
            claims.session_id
        );
    }

    #[tokio::test]
    async fn callback_with_empty_code_is_rejected_before_exchange() {
        let exchanger = Arc::new(StubExchanger::new());
        let manager = SessionManager::new(
            Arc::new(MemoryStore::new()),
            exchanger.clone(),
            codec(SECRET),
        );

        let err = manager.complete_oauth_callback("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredentialSource);
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_exchange_creates_nothing() {
        let (manager, store) = memory_manager();

        let err = manager.complete_oauth_callback("bad-code").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExchangeFailed);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn callback_with_store_down_returns_no_tokens() {
        let manager = manager_with(Arc::new(DownStore));
        let err = manager.complete_oauth_callback("valid-code").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }

    #[tokio::test]
    async fn verify_returns_upstream_credential() {
        let (manager, _store) = memory_manager();
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();

        let credential = manager.verify_session(&pair.access_token).await.unwrap();
        assert_eq!(credential.expose(), "gho_abc");
    }

    #[tokio::test]
    async fn verify_after_session_deleted_is_session_not_found() {
        let (manager, store) = memory_manager();
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();
        let claims = manager.codec().verify_access_token(&pair.access_token).unwrap();

        store.delete(&session_key(&claims.session_id)).await.unwrap();

        let err = manager.verify_session(&pair.access_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn verify_rejects_token_signed_with_other_secret() {
        let (manager, store) = memory_manager();
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();
        let claims = manager.codec().verify_access_token(&pair.access_token).unwrap();

        // The session is live, so only the signature can fail.
        assert!(store.exists(&session_key(&claims.session_id)).await.unwrap());
        let forged = codec("some-other-secret")
            .issue_access_token(&claims.session_id)
            .unwrap();

        let err = manager.verify_session(&forged).await.unwrap_err();
        assert!(
            matches!(
                err.kind(),
                ErrorKind::TokenMalformed
                    | ErrorKind::TokenExpired
                    | ErrorKind::UnexpectedSigningAlgorithm
                    | ErrorKind::WrongClaimsShape
            ),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn verify_rejects_refresh_token() {
        let (manager, _store) = memory_manager();
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();

        let err = manager.verify_session(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongClaimsShape);
    }

    #[tokio::test]
    async fn sequential_rotations_succeed_and_replay_is_revoked() {
        let (manager, store) = memory_manager();
        let first = manager.complete_oauth_callback("valid-code").await.unwrap();

        let second = manager.rotate_refresh_token(&first.refresh_token).await.unwrap();
        let third = manager.rotate_refresh_token(&second.refresh_token).await.unwrap();

        let err = manager
            .rotate_refresh_token(&first.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RefreshTokenRevoked);

        // Only the latest refresh token id is live, and the session is untouched.
        assert_eq!(store.keys_with_prefix("refresh_token:").await.len(), 1);
        let credential = manager.verify_session(&third.access_token).await.unwrap();
        assert_eq!(credential.expose(), "gho_abc");

        let a = manager.codec().verify_access_token(&first.access_token).unwrap();
        let c = manager.codec().verify_access_token(&third.access_token).unwrap();
        assert_eq!(a.session_id, c.session_id);
    }

    #[tokio::test]
    async fn replaying_rotated_token_is_revoked() {
        let (manager, _store) = memory_manager();
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();

        manager.rotate_refresh_token(&pair.refresh_token).await.unwrap();
        let err = manager
            .rotate_refresh_token(&pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RefreshTokenRevoked);
    }

    #[tokio::test]
    async fn unknown_refresh_token_id_is_revoked() {
        let (manager, _store) = memory_manager();
        let forged = manager
            .codec()
            .issue_refresh_token(&"a".repeat(64), &"b".repeat(64))
            .unwrap();

        let err = manager.rotate_refresh_token(&forged).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RefreshTokenRevoked);
    }

    #[tokio::test]
    async fn refresh_token_for_other_session_is_mismatch() {
        let (manager, store) = memory_manager();
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();
        let claims = manager
            .codec()
            .verify_refresh_token(&pair.refresh_token)
            .unwrap();

        let other_session = "c".repeat(64);
        store
            .set(
                &refresh_token_key(&claims.refresh_token_id),
                &other_session,
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let err = manager
            .rotate_refresh_token(&pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionMismatch);

        // Never auto-healed: the mapping is left as found.
        assert_eq!(
            store
                .get(&refresh_token_key(&claims.refresh_token_id))
                .await
                .unwrap(),
            other_session
        );
    }

    #[tokio::test]
    async fn rotation_for_expired_session_is_session_not_found() {
        let (manager, store) = memory_manager();
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();
        let claims = manager
            .codec()
            .verify_refresh_token(&pair.refresh_token)
            .unwrap();

        store.delete(&session_key(&claims.session_id)).await.unwrap();

        let err = manager
            .rotate_refresh_token(&pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn rotation_rejects_access_token() {
        let (manager, _store) = memory_manager();
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();

        let err = manager
            .rotate_refresh_token(&pair.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongClaimsShape);
    }

    #[tokio::test]
    async fn failure_after_consuming_old_token_is_not_rolled_back() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_refresh_sets: AtomicBool::new(false),
        });
        let manager = manager_with(store.clone());
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();

        store.fail_refresh_sets.store(true, Ordering::SeqCst);
        let err = manager
            .rotate_refresh_token(&pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

        store.fail_refresh_sets.store(false, Ordering::SeqCst);
        let err = manager
            .rotate_refresh_token(&pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RefreshTokenRevoked);

        // The session itself survives; only re-authentication restores refresh.
        assert!(store.inner.keys_with_prefix("refresh_token:").await.is_empty());
        assert!(manager.verify_session(&pair.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_rotation_of_same_token_succeeds_once() {
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            gate: Barrier::new(2),
        });
        let manager = manager_with(store.clone());
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();

        let (a, b) = tokio::join!(
            manager.rotate_refresh_token(&pair.refresh_token),
            manager.rotate_refresh_token(&pair.refresh_token),
        );

        let outcomes = [a, b];
        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one concurrent rotation may succeed");
        let loser = outcomes.into_iter().find_map(|r| r.err()).unwrap();
        assert_eq!(loser.kind(), ErrorKind::RefreshTokenRevoked);
        assert_eq!(store.inner.keys_with_prefix("refresh_token:").await.len(), 1);
    }

    #[tokio::test]
    async fn oauth_state_is_single_use() {
        let (manager, store) = memory_manager();

        let request = manager.begin_authorization().await.unwrap();
        assert!(ids::is_opaque_id(&request.state));
        assert_eq!(
            store.get(&oauth_state_key(&request.state)).await.unwrap(),
            OAUTH_STATE_PENDING
        );

        manager.consume_oauth_state(&request.state).await.unwrap();
        let err = manager
            .consume_oauth_state(&request.state)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OAuthStateInvalid);
    }

    #[tokio::test]
    async fn unknown_or_empty_state_is_rejected() {
        let (manager, _store) = memory_manager();

        let err = manager.consume_oauth_state("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredentialSource);

        let err = manager.consume_oauth_state(&"d".repeat(64)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OAuthStateInvalid);

        let err = manager.consume_oauth_state("not-hex").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OAuthStateInvalid);
    }

    #[tokio::test(start_paused = true)]
    async fn oauth_state_expires() {
        let (manager, _store) = memory_manager();
        let request = manager.begin_authorization().await.unwrap();

        tokio::time::advance(OAUTH_STATE_TTL + Duration::from_secs(1)).await;

        let err = manager
            .consume_oauth_state(&request.state)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OAuthStateInvalid);
    }

    #[tokio::test]
    async fn custom_session_ttl_is_applied() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone()).with_session_ttl(Duration::from_secs(3600));
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();
        let claims = manager.codec().verify_access_token(&pair.access_token).unwrap();

        let ttl = store.ttl(&session_key(&claims.session_id)).await.unwrap();
        assert!(ttl <= Duration::from_secs(3600));
        assert!(ttl > Duration::from_secs(3590));
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_session_ttl_still_expires() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone()).with_session_ttl(Duration::from_millis(500));
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;

        let err = manager.verify_session(&pair.access_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn zero_session_ttl_fails_callback_instead_of_storing_forever() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone()).with_session_ttl(Duration::ZERO);

        let err = manager.complete_oauth_callback("valid-code").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(store.keys_with_prefix("session:").await.is_empty());
    }

    #[tokio::test]
    async fn store_outage_is_not_reported_as_missing_session() {
        let store = Arc::new(OutageStore {
            inner: MemoryStore::new(),
            reads_down: AtomicBool::new(false),
        });
        let manager = manager_with(store.clone());
        let pair = manager.complete_oauth_callback("valid-code").await.unwrap();

        store.reads_down.store(true, Ordering::SeqCst);

        let err = manager.verify_session(&pair.access_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

        let err = manager
            .rotate_refresh_token(&pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

        store.reads_down.store(false, Ordering::SeqCst);
        assert!(
            manager.rotate_refresh_token(&pair.refresh_token).await.is_ok(),
            "an outage must not consume the refresh token"
        );
    }

    #[test]
    fn token_pair_debug_is_redacted() {
        let pair = TokenPair {
            access_token: "eyJ.secret.sig".into(),
            refresh_token: "eyJ.other.sig".into(),
        };
        let debug = format!("{pair:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
