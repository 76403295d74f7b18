// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent tool and HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::ConfigError;
use crate::services::token_store::TokenStoreError;

/// Application error type shared by the tool server and the callback server.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No refresh token available. Run the authorization flow first.")]
    NoRefreshToken,

    #[error("Authorization code exchange failed (status {status}): {message}")]
    AuthExchange { status: i64, message: String },

    #[error("Token refresh failed (status {status}): {message}")]
    Refresh { status: i64, message: String },

    #[error("{0}")]
    Authentication(String),

    #[error("Withings API error (status {status}): {message}")]
    VendorApi { status: i64, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Token store error: {0}")]
    TokenStore(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message returned once both the access and refresh paths are exhausted.
    pub const REAUTHENTICATE: &'static str = "Both access and refresh tokens are invalid. \
         Run `withings-mcp authorize` (or the withings_authorize tool) to re-authenticate.";

    /// Terminal authentication failure directing the user to re-authorize.
    pub fn reauthenticate() -> Self {
        AppError::Authentication(Self::REAUTHENTICATE.to_string())
    }

    /// True when the vendor rejected the credentials themselves, as opposed to
    /// the network failing underneath us.
    pub fn is_credential_rejection(&self) -> bool {
        matches!(
            self,
            AppError::NoRefreshToken
                | AppError::Refresh { .. }
                | AppError::AuthExchange { .. }
                | AppError::Authentication(_)
        )
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<TokenStoreError> for AppError {
    fn from(err: TokenStoreError) -> Self {
        AppError::TokenStore(err.to_string())
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
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                Some(msg.clone()),
            ),
            AppError::NoRefreshToken | AppError::Authentication(_) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", Some(self.to_string()))
            }
            AppError::AuthExchange { .. } | AppError::Refresh { .. } => {
                (StatusCode::BAD_GATEWAY, "token_error", Some(self.to_string()))
            }
            AppError::VendorApi { .. } => {
                (StatusCode::BAD_GATEWAY, "withings_error", Some(self.to_string()))
            }
            AppError::Transport(err) => {
                tracing::error!(error = %err, "Network error");
                (StatusCode::BAD_GATEWAY, "network_error", None)
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::TokenStore(msg) => {
                tracing::error!(error = %msg, "Token store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "token_store_error", None)
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

/// Result type alias for services and handlers
pub type Result<T> = std::result::Result<T, AppError>;
