//! Common types used across the application

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Amazon Standard Identification Number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asin(String);

impl Asin {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Asin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("ASIN must not be empty".to_string());
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("ASIN {:?} contains non-alphanumeric characters", trimmed));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for Asin {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asin> for String {
    fn from(asin: Asin) -> Self {
        asin.0
    }
}

impl fmt::Display for Asin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monetary amount with its ISO currency code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", crate::shared::utils::format_amount(self.amount), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asin_parsing() {
        let asin: Asin = " b0cc944lhr ".parse().unwrap();
        assert_eq!(asin.as_str(), "B0CC944LHR");

        assert!("".parse::<Asin>().is_err());
        assert!("B0CC-944L".parse::<Asin>().is_err());
    }

    #[test]
    fn test_asin_serde_is_transparent() {
        let asin: Asin = "B002VPUOOE".parse().unwrap();
        let json = serde_json::to_string(&asin).unwrap();
        assert_eq!(json, "\"B002VPUOOE\"");

        let back: Asin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, asin);
        assert!(serde_json::from_str::<Asin>("\"\"").is_err());
    }
}
