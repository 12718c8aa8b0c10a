//! Authorization URL construction
//!
//! The extension opens this URL in a browser tab. GitHub returns `state`
//! unchanged on the callback, which is how the gateway ties the callback to
//! a state it issued.

use crate::constants::AUTHORIZE_ENDPOINT;

/// Build the GitHub authorization URL for `client_id`.
///
/// `redirect_uri` is omitted when `None`, in which case GitHub uses the
/// callback registered on the OAuth app.
pub fn build_authorization_url(
    client_id: &str,
    scope: &str,
    redirect_uri: Option<&str>,
    state: &str,
) -> String {
    let mut url = format!(
        "{}?client_id={}&scope={}&state={}",
        AUTHORIZE_ENDPOINT,
        urlencoding::encode(client_id),
        urlencoding::encode(scope),
        urlencoding::encode(state),
    );
    if let Some(redirect_uri) = redirect_uri {
        url.push_str("&redirect_uri=");
        url.push_str(&urlencoding::encode(redirect_uri));
    }
    url
}
