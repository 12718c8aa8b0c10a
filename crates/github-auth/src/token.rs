//! Authorization code exchange
//!
//! POSTs the code with the app credentials to the token endpoint and asks
//! for JSON. GitHub reports a bad or expired code as status 200 with an
//! `error` body, so the body is inspected even on success.

use common::Secret;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Parameters for one code exchange.
pub struct ExchangeRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code: &'a str,
    pub redirect_uri: Option<&'a str>,
}

/// Successful exchange result.
#[derive(Debug)]
pub struct TokenResponse {
    pub access_token: Secret<String>,
    pub token_type: String,
    pub scope: String,
}

/// Raw body from the token endpoint, success and error fields together.
#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    scope: String,
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchange an authorization code for a GitHub access token.
pub async fn exchange_code(
    client: &reqwest::Client,
    endpoint: &str,
    request: &ExchangeRequest<'_>,
) -> Result<TokenResponse> {
    let mut form = vec![
        ("client_id", request.client_id),
        ("client_secret", request.client_secret),
        ("code", request.code),
    ];
    if let Some(redirect_uri) = request.redirect_uri {
        form.push(("redirect_uri", redirect_uri));
    }

    let response = client
        .post(endpoint)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let raw = response
        .json::<RawTokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    if let Some(error) = raw.error {
        return Err(Error::Rejected {
            error,
            description: raw.error_description.unwrap_or_default(),
        });
    }

    match raw.access_token {
        Some(token) if !token.is_empty() => Ok(TokenResponse {
            access_token: Secret::new(token),
            token_type: raw.token_type,
            scope: raw.scope,
        }),
        _ => Err(Error::TokenExchange(
            "token response carried no access_token".into(),
        )),
    }
}
