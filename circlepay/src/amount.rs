//! USDC amounts in base units.
//!
//! USDC has 6 decimals: a human amount such as `12.34` is carried everywhere
//! downstream as the integer `12340000`. [`TokenAmount`] holds that integer and
//! serializes it as a decimal string so it survives JSON transport without
//! precision loss.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of decimals of the USDC token.
pub const USDC_DECIMALS: u8 = 6;

const UNITS_PER_TOKEN: u64 = 1_000_000;

/// Errors from parsing an amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountParseError {
    /// Input is not a number.
    #[error("invalid amount {0:?}")]
    Invalid(String),
    /// Input is below zero.
    #[error("amount must not be negative")]
    Negative,
    /// Input does not fit the base-unit integer.
    #[error("amount is too large")]
    Overflow,
}

/// A token amount in base units (6-decimal USDC).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub U256);

impl TokenAmount {
    /// Converts a human decimal amount (`"12.34"`) to base units (`12340000`).
    ///
    /// The value is multiplied by 10^6 and rounded to the nearest integer,
    /// half away from zero.
    ///
    /// # Errors
    ///
    /// Returns [`AmountParseError`] for non-numeric, negative or oversized input.
    pub fn from_decimal_str(input: &str) -> Result<Self, AmountParseError> {
        let trimmed = input.trim();
        let decimal =
            Decimal::from_str(trimmed).map_err(|_| AmountParseError::Invalid(input.to_owned()))?;
        if decimal.is_sign_negative() && !decimal.is_zero() {
            return Err(AmountParseError::Negative);
        }
        let scaled = decimal
            .checked_mul(Decimal::from(UNITS_PER_TOKEN))
            .ok_or(AmountParseError::Overflow)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let units = scaled.to_u128().ok_or(AmountParseError::Overflow)?;
        Ok(Self(U256::from(units)))
    }

    /// Renders the base-unit value in human form, trimming trailing zeros
    /// (`12340000` → `"12.34"`, `5000000` → `"5"`).
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        let base = U256::from(UNITS_PER_TOKEN);
        let whole = self.0 / base;
        let fraction = self.0 % base;
        if fraction.is_zero() {
            return whole.to_string();
        }
        let fraction = format!("{:0>6}", fraction.to_string());
        format!("{whole}.{}", fraction.trim_end_matches('0'))
    }

    /// Whether the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl FromStr for TokenAmount {
    type Err = AmountParseError;

    /// Parses an integer base-unit string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(AmountParseError::Negative);
        }
        U256::from_str_radix(s, 10)
            .map(Self)
            .map_err(|_| AmountParseError::Invalid(s.to_owned()))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(Self::from(n)),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_to_base_units() {
        let amount = TokenAmount::from_decimal_str("12.34").unwrap();
        assert_eq!(amount, TokenAmount::from(12_340_000));
        assert_eq!(
            TokenAmount::from_decimal_str("5").unwrap(),
            TokenAmount::from(5_000_000)
        );
        assert_eq!(
            TokenAmount::from_decimal_str("0.000001").unwrap(),
            TokenAmount::from(1)
        );
    }

    #[test]
    fn test_rounds_to_nearest_base_unit() {
        assert_eq!(
            TokenAmount::from_decimal_str("1.0000005").unwrap(),
            TokenAmount::from(1_000_001)
        );
        assert_eq!(
            TokenAmount::from_decimal_str("1.0000004").unwrap(),
            TokenAmount::from(1_000_000)
        );
    }

    #[test]
    fn test_base_units_to_display() {
        assert_eq!(TokenAmount::from(12_340_000).to_decimal_string(), "12.34");
        assert_eq!(TokenAmount::from(5_000_000).to_decimal_string(), "5");
        assert_eq!(TokenAmount::from(1).to_decimal_string(), "0.000001");
        assert_eq!(TokenAmount::from(0).to_decimal_string(), "0");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            TokenAmount::from_decimal_str("-1"),
            Err(AmountParseError::Negative)
        );
        assert!(matches!(
            TokenAmount::from_decimal_str("twelve"),
            Err(AmountParseError::Invalid(_))
        ));
        assert!(matches!(
            TokenAmount::from_decimal_str(""),
            Err(AmountParseError::Invalid(_))
        ));
        assert!("1.5".parse::<TokenAmount>().is_err());
    }

    #[test]
    fn test_wire_form_is_decimal_string() {
        let amount = TokenAmount::from(5_000_000);
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"5000000\"");
        let from_number: TokenAmount = serde_json::from_str("5000000").unwrap();
        assert_eq!(from_number, amount);
    }
}
