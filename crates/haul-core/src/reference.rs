//! Waybill reference numbers.
//!
//! Customer-facing document references of the form `WB-XXXXXXXX` where the
//! suffix is uppercase alphanumeric. References are generated from a fresh
//! UUID when the caller does not supply one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// A validated waybill reference number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaybillNo(String);

impl WaybillNo {
    /// Parse and validate a caller-supplied reference.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        let Some(suffix) = raw.strip_prefix("WB-") else {
            return Err(ValidationError::InvalidWaybill(raw.to_string()));
        };
        if suffix.is_empty()
            || suffix.len() > 32
            || !suffix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(ValidationError::InvalidWaybill(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Generate a fresh reference from a random UUID.
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        // First eight hex chars, uppercased, short enough to read out loud.
        Self(format!("WB-{}", raw[..8].to_ascii_uppercase()))
    }

    /// The reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WaybillNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
