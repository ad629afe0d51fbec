//! Error types for Guildgate
//!
//! API handlers return `AppError`, which implements `IntoResponse`
//! for JSON error responses. The OAuth callback never surfaces these
//! directly; see `auth::oauth::AuthFailure`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required (401)
    #[error("Not logged in")]
    Unauthorized,

    /// Signature verification failed (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Webhook URL missing from configuration (500)
    #[error("Webhook URL not configured")]
    WebhookMisconfigured,

    /// Webhook rejected or never received the notification (500)
    #[error("Webhook delivery failed: {0}")]
    WebhookDelivery(String),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption/decryption error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::WebhookMisconfigured => {
                (StatusCode::INTERNAL_SERVER_ERROR, "webhook_misconfigured")
            }
            AppError::WebhookDelivery(_) => (StatusCode::INTERNAL_SERVER_ERROR, "webhook_delivery"),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, "http_client"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Encryption(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encryption"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        self.status_and_type().0
    }

    /// Message safe to show to the browser
    ///
    /// Upstream details stay in the server log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::WebhookDelivery(_) => "Failed to send loan request".to_string(),
            AppError::HttpClient(_) => "Upstream request failed".to_string(),
            AppError::Config(_) | AppError::Encryption(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Record the error metric for this error
    pub(crate) fn record(&self) {
        use crate::metrics::ERRORS_TOTAL;

        let (_, error_type) = self.status_and_type();
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        self.record();

        let body = Json(serde_json::json!({
            "error": self.public_message(),
        }));

        (self.status(), body).into_response()
    }
}
