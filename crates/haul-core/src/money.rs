//! Monetary values.
//!
//! Amounts are integer minor units (cents, paisa, fils); floats are never
//! permitted in monetary fields. The currency is a three-letter ISO-4217
//! code stored uppercase.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A monetary amount in integer minor units with its currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g. cents). Never negative.
    pub minor: i64,
    /// ISO-4217 currency code, uppercase.
    pub currency: String,
}

impl Money {
    /// Construct a validated monetary amount.
    ///
    /// Rejects negative amounts and malformed currency codes.
    pub fn new(minor: i64, currency: &str) -> Result<Self, ValidationError> {
        if minor < 0 {
            return Err(ValidationError::NegativeAmount(minor));
        }
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidCurrency(currency.to_string()));
        }
        Ok(Self {
            minor,
            currency: currency.to_string(),
        })
    }

    /// A zero amount in the given currency.
    ///
    /// Used by the financial trigger when an entity has no precomputed pay
    /// total, the payable record is still created, with amount zero.
    pub fn zero(currency: &str) -> Result<Self, ValidationError> {
        Self::new(0, currency)
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.minor, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_money() {
        let m = Money::new(125_000, "PKR").unwrap();
        assert_eq!(m.minor, 125_000);
        assert_eq!(m.currency, "PKR");
        assert!(!m.is_zero());
    }

    #[test]
    fn zero_money() {
        let m = Money::zero("USD").unwrap();
        assert!(m.is_zero());
    }

    #[test]
    fn negative_amount_rejected() {
        assert!(matches!(
            Money::new(-1, "USD"),
            Err(ValidationError::NegativeAmount(-1))
        ));
    }

    #[test]
    fn bad_currency_rejected() {
        assert!(Money::new(100, "usd").is_err());
        assert!(Money::new(100, "US").is_err());
        assert!(Money::new(100, "USDX").is_err());
        assert!(Money::new(100, "U5D").is_err());
    }

    #[test]
    fn serde_round_trip() {
        let m = Money::new(42, "AED").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"minor\":42"));
        let parsed: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, m);
    }
}
