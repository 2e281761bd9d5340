// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// There is deliberately no rate-limited variant: the token bucket blocks
/// callers instead of failing them.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Network, DNS or timeout failure talking to the Bungie API.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Non-2xx response, or an API-level error code inside a 2xx envelope.
    #[error("Bungie API error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        code: Option<i32>,
        message: String,
    },

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Several linked profiles and no cross-save override to pick one.
    #[error("Unresolved cross-save identity: {0}")]
    Unresolved(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Bungie's envelope code for a successful call.
    pub const BUNGIE_SUCCESS: i32 = 1;

    /// Build an upstream error from an HTTP status.
    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        AppError::Upstream {
            status: Some(status),
            code: None,
            message: message.into(),
        }
    }

    /// Build an upstream error from a Bungie envelope error code.
    pub fn upstream_code(code: i32, message: impl Into<String>) -> Self {
        AppError::Upstream {
            status: None,
            code: Some(code),
            message: message.into(),
        }
    }

    /// Failures that a paginated fetch treats as "no more data for now".
    pub fn is_soft_failure(&self) -> bool {
        matches!(self, AppError::Transport(_) | AppError::Upstream { .. })
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Transport(msg) => {
                tracing::warn!(error = %msg, "Bungie transport failure");
                (StatusCode::BAD_GATEWAY, "transport_error", Some(msg.clone()))
            }
            AppError::Upstream { .. } => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                Some(self.to_string()),
            ),
            AppError::CacheUnavailable(msg) => {
                tracing::error!(error = %msg, "Cache unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable", None)
            }
            AppError::Unresolved(msg) => (StatusCode::CONFLICT, "unresolved", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, AppError>;
