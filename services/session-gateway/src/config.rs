//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! Secrets (signing secret, store token, OAuth client secret) are loaded
//! from env vars or `*_file` paths, never stored in the TOML directly.

use common::{Secret, resolve_secret};
use serde::Deserialize;
use session::TokenLifetimes;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const KV_TOKEN_ENV: &str = "KV_REST_API_TOKEN";
pub const KV_URL_ENV: &str = "KV_REST_API_URL";
pub const CLIENT_ID_ENV: &str = "GITHUB_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "GITHUB_CLIENT_SECRET";
pub const EXTENSION_ID_ENV: &str = "CHROME_EXTENSION_ID";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Browser extension allowed by CORS; no CORS headers when unset
    #[serde(default)]
    pub extension_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// REST key-value service
    #[default]
    Rest,
    /// Process-local map; sessions die with the process
    Memory,
}

/// Session store settings
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(skip)]
    pub token: Option<Secret<String>>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            timeout_secs: default_store_timeout(),
            token_file: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateVerification {
    /// The callback must redeem a state issued by `/api/authorize`
    #[default]
    Stored,
    /// The callback only checks that a state is present
    Presence,
}

/// GitHub OAuth app settings
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    #[serde(default = "default_oauth_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub state_verification: StateVerification,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret_file: None,
            client_secret: None,
            timeout_secs: default_oauth_timeout(),
            scope: default_scope(),
            redirect_uri: None,
            state_verification: StateVerification::default(),
        }
    }
}

/// Signed token settings
#[derive(Debug, Deserialize)]
pub struct TokensConfig {
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            secret_file: None,
            secret: None,
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

impl TokensConfig {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: Duration::from_secs(self.access_ttl_secs),
            refresh: Duration::from_secs(self.refresh_ttl_secs),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

fn default_max_connections() -> usize {
    1000
}

fn default_store_timeout() -> u64 {
    session::constants::DEFAULT_STORE_TIMEOUT.as_secs()
}

fn default_oauth_timeout() -> u64 {
    github_auth::DEFAULT_TIMEOUT.as_secs()
}

fn default_scope() -> String {
    github_auth::DEFAULT_SCOPE.to_owned()
}

fn default_access_ttl() -> u64 {
    session::constants::DEFAULT_ACCESS_TOKEN_TTL.as_secs()
}

fn default_refresh_ttl() -> u64 {
    session::constants::DEFAULT_REFRESH_TOKEN_TTL.as_secs()
}

fn default_session_ttl() -> u64 {
    session::constants::DEFAULT_SESSION_TTL.as_secs()
}

/// Non-empty value of `key`, if set.
fn env_override(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn require_http_url(field: &str, url: &str) -> common::Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {url}"
        )));
    }
    Ok(())
}

fn require_non_zero(field: &str, value: u64) -> common::Result<()> {
    if value == 0 {
        return Err(common::Error::Config(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Every secret resolves from its env var first, then from its `*_file`.
    /// A missing signing secret, OAuth client secret, or (for the REST
    /// backend) store token is fatal.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Some(url) = env_override(KV_URL_ENV) {
            config.store.url = Some(url);
        }
        if let Some(client_id) = env_override(CLIENT_ID_ENV) {
            config.oauth.client_id = client_id;
        }
        if let Some(extension_id) = env_override(EXTENSION_ID_ENV) {
            config.server.extension_id = Some(extension_id);
        }

        config.tokens.secret = resolve_secret(JWT_SECRET_ENV, config.tokens.secret_file.as_deref())?;
        config.oauth.client_secret =
            resolve_secret(CLIENT_SECRET_ENV, config.oauth.client_secret_file.as_deref())?;
        config.store.token = resolve_secret(KV_TOKEN_ENV, config.store.token_file.as_deref())?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        require_non_zero("store.timeout_secs", self.store.timeout_secs)?;
        require_non_zero("oauth.timeout_secs", self.oauth.timeout_secs)?;
        require_non_zero("tokens.access_ttl_secs", self.tokens.access_ttl_secs)?;
        require_non_zero("tokens.refresh_ttl_secs", self.tokens.refresh_ttl_secs)?;
        require_non_zero("tokens.session_ttl_secs", self.tokens.session_ttl_secs)?;

        if self.tokens.access_ttl_secs >= self.tokens.refresh_ttl_secs {
            return Err(common::Error::Config(format!(
                "tokens.access_ttl_secs ({}) must be shorter than tokens.refresh_ttl_secs ({})",
                self.tokens.access_ttl_secs, self.tokens.refresh_ttl_secs
            )));
        }

        if self.store.backend == StoreBackend::Rest {
            let url = self.store.url.as_deref().ok_or_else(|| {
                common::Error::Config(format!(
                    "store.url (or {KV_URL_ENV}) is required for the rest backend"
                ))
            })?;
            require_http_url("store.url", url)?;
            if self.store.token.is_none() {
                return Err(common::Error::MissingSecret(format!(
                    "{KV_TOKEN_ENV} or store.token_file is required for the rest backend"
                )));
            }
        }

        if self.oauth.client_id.is_empty() {
            return Err(common::Error::Config(format!(
                "oauth.client_id (or {CLIENT_ID_ENV}) is required"
            )));
        }
        if self.oauth.client_secret.is_none() {
            return Err(common::Error::MissingSecret(format!(
                "{CLIENT_SECRET_ENV} or oauth.client_secret_file is required"
            )));
        }
        if let Some(redirect_uri) = &self.oauth.redirect_uri {
            require_http_url("oauth.redirect_uri", redirect_uri)?;
        }

        if self.tokens.secret.is_none() {
            return Err(common::Error::MissingSecret(format!(
                "{JWT_SECRET_ENV} or tokens.secret_file is required"
            )));
        }

        if let Some(extension_id) = &self.server.extension_id {
            if extension_id.is_empty()
                || !extension_id.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err(common::Error::Config(format!(
                    "server.extension_id must be alphanumeric, got: {extension_id}"
                )));
            }
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("status-viewer-gateway.toml")
    }
}
