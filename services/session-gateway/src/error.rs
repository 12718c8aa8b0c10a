//! Error classification at the HTTP boundary
//!
//! Every failure is classified exactly once, here, through [`classify`]: a
//! total mapping from `ErrorKind` to status, public code and message.
//! Internal detail goes to the log and never into the response body. All
//! token validation failures share one response so callers cannot probe
//! which check failed.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use session::ErrorKind;
use tracing::{debug, error, warn};

use crate::metrics;

/// Public face of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: &'static str,
}

const INVALID_TOKEN: Classification = Classification {
    status: StatusCode::UNAUTHORIZED,
    code: "invalid_token",
    message: "Invalid or expired token",
};

const SERVER_ERROR: Classification = Classification {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    code: "server_error",
    message: "Internal server error",
};

pub fn classify(kind: ErrorKind) -> Classification {
    match kind {
        ErrorKind::MissingCredentialSource => Classification {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request",
            message: "Required parameter is missing",
        },
        ErrorKind::ExchangeFailed => Classification {
            status: StatusCode::BAD_REQUEST,
            code: "exchange_failed",
            message: "Failed to exchange authorization code",
        },
        ErrorKind::StoreUnavailable
        | ErrorKind::IdGenerationFailed
        | ErrorKind::TokenSigningFailed => SERVER_ERROR,
        ErrorKind::TokenMalformed
        | ErrorKind::TokenExpired
        | ErrorKind::UnexpectedSigningAlgorithm
        | ErrorKind::WrongClaimsShape => INVALID_TOKEN,
        ErrorKind::SessionNotFound => Classification {
            status: StatusCode::UNAUTHORIZED,
            code: "session_not_found",
            message: "Session expired or invalid",
        },
        ErrorKind::RefreshTokenRevoked => Classification {
            status: StatusCode::UNAUTHORIZED,
            code: "refresh_token_revoked",
            message: "Refresh token has been revoked or expired",
        },
        ErrorKind::SessionMismatch => Classification {
            status: StatusCode::UNAUTHORIZED,
            code: "session_mismatch",
            message: "Session mismatch detected",
        },
        ErrorKind::OAuthStateInvalid => Classification {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_state",
            message: "Authorization state is invalid or expired",
        },
    }
}

/// Errors returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] session::Error),

    #[error("bearer token required")]
    BearerRequired,

    #[error("invalid JSON body: {0}")]
    InvalidJson(String),
}

impl ApiError {
    pub fn classification(&self) -> Classification {
        match self {
            ApiError::Session(e) => classify(e.kind()),
            ApiError::BearerRequired => Classification {
                status: StatusCode::UNAUTHORIZED,
                code: "invalid_token",
                message: "Bearer token required",
            },
            ApiError::InvalidJson(_) => Classification {
                status: StatusCode::BAD_REQUEST,
                code: "invalid_json",
                message: "Request body must be valid JSON",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let class = self.classification();

        match &self {
            ApiError::Session(e) if e.kind().is_security_event() => {
                let kind = e.kind().label();
                metrics::record_security_event(kind);
                warn!(security_event = kind, error = %self, code = class.code, "request rejected");
            }
            _ if class.status.is_server_error() => {
                error!(error = %self, code = class.code, "request failed");
            }
            _ => {
                debug!(error = %self, code = class.code, "request rejected");
            }
        }

        (
            class.status,
            Json(json!({
                "error": class.code,
                "error_description": class.message,
            })),
        )
            .into_response()
    }
}
