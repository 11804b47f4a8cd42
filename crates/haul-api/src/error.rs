//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from haul-state and haul-core to HTTP status codes.
//! Returns JSON error response bodies with a stable machine-readable code
//! and a human message. Never exposes internal error details to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API
/// surface. The `details` field carries additional context for validation
/// errors but is omitted for 500-class errors to prevent information
/// leakage.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "POD_REQUIRED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
///
/// The three business-rule vetoes (`InvalidTransition`, `DriverNotAvailable`,
/// `PodRequired`) all map to 409 Conflict with distinct codes: the request
/// was well-formed but the current state of the world rejects it.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404). Also returned for cross-tenant lookups.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed before any state was touched (400).
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication failure, missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Status transition rejected by the transition table (409).
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Driver is not idle and cannot take the assignment (409).
    #[error("driver not available: {0}")]
    DriverNotAvailable(String),

    /// Completion requires at least one proof-of-delivery artifact (409).
    #[error("proof of delivery required: {0}")]
    PodRequired(String),

    /// Internal server error (500). Message is logged but not returned to
    /// the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::InvalidTransition(_) => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            Self::DriverNotAvailable(_) => (StatusCode::CONFLICT, "DRIVER_NOT_AVAILABLE"),
            Self::PodRequired(_) => (StatusCode::CONFLICT, "POD_REQUIRED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages (database text, file paths)
        // to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        if let Self::Internal(_) = &self {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert haul-core validation errors to API errors.
impl From<haul_core::ValidationError> for AppError {
    fn from(err: haul_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Convert transition-table rejections to API errors.
impl From<haul_state::TransitionError> for AppError {
    fn from(err: haul_state::TransitionError) -> Self {
        Self::InvalidTransition(err.to_string())
    }
}
