//! GitHub OAuth app client
//!
//! Holds the app credentials and a pooled HTTP client built once at
//! startup, and plugs into the session manager as its code exchanger.

use std::time::Duration;

use common::Secret;
use session::{CodeExchanger, ExchangeFuture};
use tracing::{debug, warn};

use crate::authorize::build_authorization_url;
use crate::constants::{DEFAULT_SCOPE, TOKEN_ENDPOINT};
use crate::error::{Error, Result};
use crate::token::{ExchangeRequest, exchange_code};

pub struct GitHubOAuthClient {
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: Secret<String>,
    scope: String,
    redirect_uri: Option<String>,
}

impl GitHubOAuthClient {
    pub fn new(client_id: String, client_secret: Secret<String>, timeout: Duration) -> Result<Self> {
        if client_id.is_empty() {
            return Err(Error::InvalidConfig("client id is empty".into()));
        }
        if client_secret.is_empty() {
            return Err(Error::InvalidConfig("client secret is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            token_endpoint: TOKEN_ENDPOINT.to_owned(),
            client_id,
            client_secret,
            scope: DEFAULT_SCOPE.to_owned(),
            redirect_uri: None,
        })
    }

    /// Point code exchange at a different token endpoint.
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: Option<String>) -> Self {
        self.redirect_uri = redirect_uri;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Authorization URL carrying `state`, for the configured app and scope.
    pub fn authorization_url(&self, state: &str) -> String {
        build_authorization_url(
            &self.client_id,
            &self.scope,
            self.redirect_uri.as_deref(),
            state,
        )
    }
}

impl CodeExchanger for GitHubOAuthClient {
    fn exchange_code<'a>(&'a self, code: &'a str) -> ExchangeFuture<'a> {
        Box::pin(async move {
            let request = ExchangeRequest {
                client_id: &self.client_id,
                client_secret: self.client_secret.expose(),
                code,
                redirect_uri: self.redirect_uri.as_deref(),
            };

            match exchange_code(&self.http, &self.token_endpoint, &request).await {
                Ok(token) => {
                    debug!(scope = %token.scope, "authorization code exchanged");
                    Ok(token.access_token)
                }
                Err(e) => {
                    warn!(error = %e, "authorization code exchange failed");
                    Err(session::Error::ExchangeFailed(e.to_string()))
                }
            }
        })
    }
}
