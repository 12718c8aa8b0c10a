//! OAuth code exchange contract
//!
//! The manager trades an authorization code for an upstream credential
//! through this trait. The GitHub client lives in its own crate; tests plug
//! in a stub.

use std::future::Future;
use std::pin::Pin;

use common::Secret;

use crate::error::Result;

/// Opaque bearer credential issued by the identity provider.
pub type UpstreamCredential = Secret<String>;

/// Boxed future returned by [`CodeExchanger::exchange_code`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<UpstreamCredential>> + Send + 'a>>;

/// Trades an OAuth authorization code for an upstream credential.
///
/// Implementations report every failure, transport or provider-side, as
/// `Error::ExchangeFailed`.
pub trait CodeExchanger: Send + Sync {
    fn exchange_code<'a>(&'a self, code: &'a str) -> ExchangeFuture<'a>;
}
