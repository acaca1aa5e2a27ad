use crate::error::BookingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits carried by every monetary field.
pub const MONEY_SCALE: u32 = 2;

/// A non-negative monetary value with exactly 2 decimal places.
///
/// This is a wrapper around `rust_decimal::Decimal` so that prices and
/// payment amounts never go through floating point and never drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Validates and normalizes `value` to 2 fractional digits.
    ///
    /// Negative values and values with more than 2 significant fractional
    /// digits are rejected rather than rounded.
    pub fn new(value: Decimal) -> Result<Self, BookingError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(BookingError::Validation(format!(
                "amount must not be negative, got {value}"
            )));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(BookingError::Validation(format!(
                "amount {value} has more than {MONEY_SCALE} decimal places"
            )));
        }
        let mut normalized = value.abs();
        normalized.rescale(MONEY_SCALE);
        Ok(Self(normalized))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Price for `count` units (nights) of this amount.
    pub fn times(&self, count: u32) -> Result<Self, BookingError> {
        let total = self
            .0
            .checked_mul(Decimal::from(count))
            .ok_or_else(|| BookingError::Validation("total price overflows".to_string()))?;
        Self::new(total)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = BookingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl FromStr for Money {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| BookingError::Validation(format!("invalid amount {s:?}: {e}")))?;
        Self::new(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Three-letter currency code. Treated as opaque: no conversion happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub const DEFAULT_CODE: &'static str = "ETB";

    pub fn new(code: &str) -> Result<Self, BookingError> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(BookingError::Validation(format!(
                "currency must be a 3-letter code, got {code:?}"
            )))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self(Self::DEFAULT_CODE.to_string())
    }
}

impl TryFrom<String> for Currency {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_normalizes_to_two_places() {
        let money = Money::new(dec!(1000)).unwrap();
        assert_eq!(money.to_string(), "1000.00");
        assert_eq!(Money::new(dec!(12.5)).unwrap().to_string(), "12.50");
        assert_eq!(Money::new(dec!(3.1400)).unwrap().to_string(), "3.14");
    }

    #[test]
    fn test_money_validation() {
        assert!(Money::new(dec!(0)).is_ok());
        assert!(matches!(
            Money::new(dec!(-1.0)),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            Money::new(dec!(1.005)),
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn test_money_times_nights() {
        let nightly = Money::new(dec!(1000.00)).unwrap();
        assert_eq!(nightly.times(4).unwrap().value(), dec!(4000.00));
        assert_eq!(nightly.times(4).unwrap().to_string(), "4000.00");
        assert_eq!(Money::new(dec!(99.99)).unwrap().times(3).unwrap().value(), dec!(299.97));
    }

    #[test]
    fn test_money_serde_uses_decimal_strings() {
        let money: Money = serde_json::from_str("\"4000.00\"").unwrap();
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"4000.00\"");
        assert!(serde_json::from_str::<Money>("\"-5\"").is_err());
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::default().code(), "ETB");
        assert_eq!(Currency::new("usd").unwrap().code(), "USD");
        assert!(Currency::new("EURO").is_err());
        assert!(Currency::new("E1B").is_err());
    }
}
