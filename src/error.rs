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
    /// Missing, invalid or expired session. Deliberately carries no detail.
    #[error("User not logged in")]
    NotLoggedIn,

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Signup with an email that is already claimed.
    #[error("User already exists")]
    UserExists,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The user has no usable Google token bundle.
    #[error("Google Calendar not linked")]
    CalendarNotLinked,

    /// Refresh exchange rejected by Google. Callers treat this as "re-authorize".
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Google Calendar API error: {0}")]
    CalendarApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message returned to clients whose calendar link is missing or stale.
    pub const GOOGLE_SIGN_IN_REQUIRED: &'static str = "Please sign in with google to sync";

    /// Client-facing message. Never includes internal detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotLoggedIn => "User not logged in".to_string(),
            AppError::InvalidCredentials => "Invalid credentials.".to_string(),
            AppError::UserExists => "User Already exists".to_string(),
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::CalendarNotLinked | AppError::TokenRefresh(_) => {
                Self::GOOGLE_SIGN_IN_REQUIRED.to_string()
            }
            AppError::CalendarApi(_) => "Google Calendar request failed".to_string(),
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// True when the only remedy is sending the user through the consent flow again.
    pub fn needs_authorization(&self) -> bool {
        matches!(self, AppError::CalendarNotLinked | AppError::TokenRefresh(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, error) = match &self {
            AppError::NotLoggedIn => (StatusCode::UNAUTHORIZED, self.public_message(), None),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.public_message(), None),
            // 401 rather than 409: existing clients match on it.
            AppError::UserExists => (StatusCode::UNAUTHORIZED, self.public_message(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::CalendarNotLinked => (StatusCode::UNAUTHORIZED, self.public_message(), None),
            AppError::TokenRefresh(msg) => {
                tracing::warn!(error = %msg, "Google token refresh failed");
                (StatusCode::UNAUTHORIZED, self.public_message(), None)
            }
            AppError::CalendarApi(msg) => {
                tracing::error!(error = %msg, "Google Calendar API error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    self.public_message(),
                    Some(msg.clone()),
                )
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.public_message(), None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.public_message(), None)
            }
        };

        let body = ErrorResponse { message, error };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
