//! Minor-unit amount helpers and currency codes.
//!
//! All amounts are `i64` in the smallest currency unit (e.g. paise). Sums of
//! many amounts are accumulated in `i128`.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// ISO-4217 style currency code (three ASCII letters, stored upper-case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> LedgerResult<Self> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::validation(format!(
                "invalid currency '{code}': expected a 3-letter code"
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reject zero and negative amounts.
pub fn ensure_positive(amount: i64, what: &str) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::validation(format!("{what} must be positive")));
    }
    Ok(())
}

/// `a + b`, reporting overflow as a validation failure.
pub fn checked_add(a: i64, b: i64, what: &str) -> LedgerResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::validation(format!("{what} overflow")))
}

/// `a - b`, reporting overflow as a validation failure.
pub fn checked_sub(a: i64, b: i64, what: &str) -> LedgerResult<i64> {
    a.checked_sub(b)
        .ok_or_else(|| LedgerError::validation(format!("{what} overflow")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_is_normalised() {
        assert_eq!(Currency::parse(" inr ").unwrap().as_str(), "INR");
        assert!(Currency::parse("RUPEE").is_err());
        assert!(Currency::parse("1NR").is_err());
    }

    #[test]
    fn overflow_is_reported() {
        assert!(checked_add(i64::MAX, 1, "balance").is_err());
        assert_eq!(checked_sub(10, 3, "balance").unwrap(), 7);
        assert!(ensure_positive(0, "amount").is_err());
    }
}
