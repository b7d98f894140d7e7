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
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    /// The user has never connected Strava (no stored credential).
    #[error("Strava account not connected")]
    NotConnected,

    /// Strava rejected the refresh exchange. Stored credentials are untouched.
    #[error("Strava token refresh failed: {0}")]
    RefreshFailed(String),

    /// Network failure, timeout, rate limit or 5xx from Strava.
    #[error("Strava unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Drop not found: {0}")]
    DropNotFound(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the caller can reasonably retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::RefreshFailed(_) | AppError::ProviderUnavailable(_) | AppError::Database(_)
        )
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
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotConnected => (
                StatusCode::CONFLICT,
                "not_connected",
                Some("Connect your Strava account to sync activities".to_string()),
            ),
            AppError::RefreshFailed(msg) => {
                tracing::warn!(error = %msg, "Strava token refresh failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "refresh_failed",
                    Some("Strava authorization could not be renewed; try again later".to_string()),
                )
            }
            AppError::ProviderUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "strava_unavailable",
                Some(msg.clone()),
            ),
            AppError::DropNotFound(id) => (StatusCode::NOT_FOUND, "drop_not_found", Some(id.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::StravaApi(msg) => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
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

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
