//! Structured validation errors.
//!
//! All constructors in this crate that can reject their input return a
//! [`ValidationError`]. The API layer converts these into 400-class
//! responses; the message text is safe to surface to clients.

use thiserror::Error;

/// Validation failure for a haul-core domain value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Currency code is not three ASCII uppercase letters.
    #[error("invalid currency code '{0}': expected three ASCII uppercase letters")]
    InvalidCurrency(String),

    /// Monetary amount is negative.
    #[error("negative amount not permitted: {0}")]
    NegativeAmount(i64),

    /// Waybill reference does not match the expected format.
    #[error("invalid waybill reference '{0}': expected WB-XXXXXXXX (uppercase alphanumeric)")]
    InvalidWaybill(String),

    /// A required field was empty or whitespace-only.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}
