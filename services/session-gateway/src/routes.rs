//! HTTP surface of the session gateway
//!
//! - `GET  /api/authorize` issues an OAuth state and the GitHub authorization URL
//! - `GET  /api/callback?code=&state=` completes the OAuth flow
//! - `POST /api/verify` resolves a bearer access token to the upstream credential
//! - `POST /api/refresh` rotates a refresh token
//! - `GET  /health`, `GET /metrics`

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, InvalidHeaderValue};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use github_auth::GitHubOAuthClient;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::{Value, json};
use session::{SessionManager, TokenPair};
use tower_http::cors::CorsLayer;
use tracing::{Instrument, info_span};

use crate::config::StateVerification;
use crate::error::ApiError;
use crate::metrics::{self, ServiceMetrics};

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub github: Arc<GitHubOAuthClient>,
    pub state_verification: StateVerification,
    pub metrics: ServiceMetrics,
    pub prometheus: PrometheusHandle,
}

/// Build the router with all routes and shared state.
///
/// `cors` is applied when an extension origin is configured. The
/// concurrency limit wraps everything, so excess requests queue.
pub fn build_router(state: AppState, max_connections: usize, cors: Option<CorsLayer>) -> Router {
    let mut router = Router::new()
        .route("/api/authorize", get(authorize_handler))
        .route("/api/callback", get(callback_handler))
        .route("/api/verify", post(verify_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    if let Some(cors) = cors {
        router = router.layer(cors);
    }
    router.layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

/// CORS policy admitting only the given browser extension.
pub fn extension_cors(extension_id: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    let origin = HeaderValue::from_str(&format!("chrome-extension://{extension_id}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]))
}

/// Decrements the in-flight gauge when the request finishes or is dropped.
struct InFlight(Arc<AtomicU64>);

impl InFlight {
    fn enter(counter: &Arc<AtomicU64>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Run one API operation inside a request span and record its outcome.
async fn observe<T, F>(state: &AppState, operation: &'static str, work: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let span = info_span!("request", request_id = %request_id, operation);

    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
    let _in_flight = InFlight::enter(&state.metrics.in_flight);
    let start = Instant::now();

    let result = work.instrument(span).await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.classification().code,
    };
    metrics::record_request(operation, outcome, start.elapsed().as_secs_f64());
    result
}

async fn authorize_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    observe(&state, "authorize", async {
        let request = state.manager.begin_authorization().await?;
        Ok::<_, ApiError>(Json(json!({
            "authorization_url": state.github.authorization_url(&request.state),
            "state": request.state,
        })))
    })
    .await
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<TokenPair>, ApiError> {
    observe(&state, "callback", async {
        // Checked before the state is redeemed so a malformed callback
        // does not burn a valid state.
        if params.code.is_empty() {
            return Err(session::Error::MissingCredentialSource(
                "missing code parameter".into(),
            )
            .into());
        }

        match state.state_verification {
            StateVerification::Stored => state.manager.consume_oauth_state(&params.state).await?,
            StateVerification::Presence if params.state.is_empty() => {
                return Err(session::Error::MissingCredentialSource(
                    "missing state parameter".into(),
                )
                .into());
            }
            StateVerification::Presence => {}
        }

        let pair = state.manager.complete_oauth_callback(&params.code).await?;
        Ok::<_, ApiError>(Json(pair))
    })
    .await
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::BearerRequired)
}

async fn verify_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    observe(&state, "verify", async {
        let token = bearer_token(&headers)?;
        let credential = state.manager.verify_session(token).await?;
        Ok::<_, ApiError>(Json(json!({ "access_token": credential.expose() })))
    })
    .await
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: String,
}

async fn refresh_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TokenPair>, ApiError> {
    observe(&state, "refresh", async {
        let request: RefreshRequest =
            serde_json::from_slice(&body).map_err(|e| ApiError::InvalidJson(e.to_string()))?;
        if request.refresh_token.is_empty() {
            return Err(session::Error::MissingCredentialSource(
                "missing refresh_token".into(),
            )
            .into());
        }
        let pair = state
            .manager
            .rotate_refresh_token(&request.refresh_token)
            .await?;
        Ok::<_, ApiError>(Json(pair))
    })
    .await
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
    }))
}

/// Prometheus metrics endpoint, text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}
