//! Session and token lifecycle for the GitHub OAuth bridge
//!
//! Binds a short-lived signed identity to a long-lived upstream credential
//! that never leaves the server:
//!
//! - `ids`: opaque 256-bit hex identifiers
//! - `token`: HMAC-signed access and refresh tokens
//! - `store`: TTL key-value contract plus the in-memory backend
//! - `kv`: REST key-value backend
//! - `exchange`: authorization code → upstream credential contract
//! - `manager`: callback, verify and rotation protocols

pub mod constants;
pub mod error;
pub mod exchange;
pub mod ids;
pub mod kv;
pub mod manager;
pub mod store;
pub mod token;

pub use error::{Error, ErrorKind, Result};
pub use exchange::{CodeExchanger, ExchangeFuture, UpstreamCredential};
pub use kv::KvRestStore;
pub use manager::{AuthorizationRequest, SessionManager, TokenPair};
pub use store::{MemoryStore, SessionStore, StoreError, StoreFuture, StoreResult};
pub use token::{AccessClaims, RefreshClaims, TokenCodec, TokenLifetimes};
