//! # Custom Extractors
//!
//! Validated JSON body extraction. Handlers take
//! `Result<Json<T>, JsonRejection>` and run it through
//! [`extract_validated_json`] so deserialization failures and business
//! validation failures both surface as `VALIDATION_ERROR` responses
//! instead of axum's default plain-text rejection.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Request-body validation, run after deserialization succeeds.
pub trait Validate {
    /// Return `Err` with a client-safe message when the body is invalid.
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON extraction result and validate the body.
pub fn extract_validated_json<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = body.map_err(|e| AppError::Validation(format!("invalid request body: {e}")))?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}
