//! Error handling for FocusFlow Timer
//!
//! Centralized error types and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::timer_session::TimerSessionError;
use crate::services::commit::CommitError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Timer session error: {0}")]
    TimerSession(#[from] TimerSessionError),

    #[error("Commit failed: {0}")]
    Commit(#[from] CommitError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl AppError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::TimerSession(_) | AppError::BadRequest(_) | AppError::UrlParse(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Commit(_) => StatusCode::BAD_GATEWAY,
            AppError::HttpClient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::TimerSession(_) => "TimerSessionError",
            AppError::Commit(e) => e.code(),
            AppError::BadRequest(_) => "BadRequest",
            AppError::HttpClient(_) => "HttpClientError",
            AppError::UrlParse(_) => "UrlParseError",
        }
    }

    /// Check if this error should be logged as an error vs warning
    pub fn is_server_error(&self) -> bool {
        matches!(self, AppError::HttpClient(_))
    }

    pub fn bad_request(message: &str) -> Self {
        AppError::BadRequest(message.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let status = self.status_code();
        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "timestamp": chrono::Utc::now().timestamp()
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
