//! # Money Module
//!
//! Provides the `Money` type for card balances, fares and top-ups.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE PRECISION PROBLEM                                                  │
//! │                                                                         │
//! │  Floating point:                                                        │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Integer cents:                                                         │
//! │    Works only when every deployment has exactly 2 minor digits.         │
//! │    A fare of 12.345 would be rounded on the way in. ❌                  │
//! │                                                                         │
//! │  OUR SOLUTION: Exact decimal (rust_decimal)                            │
//! │    150 - 12.345 = 137.655  (scale kept, nothing rounded)               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The deployment currency has no fractional sub-unit, but the ledger never
//! assumes that: whatever precision a validator sends is carried through to
//! `balance_before`/`balance_after` unchanged.
//!
//! ## Usage
//! ```rust
//! use farelink_core::money::Money;
//!
//! let balance = Money::from_units(500);
//! let fare: Money = "150".parse().unwrap();
//!
//! assert_eq!((balance - fare).to_string(), "350");
//! ```

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in the deployment currency.
///
/// ## Design Decisions
/// - **Decimal (signed)**: exact base-10 arithmetic, 28 significant digits
/// - **Single field tuple struct**: zero-cost wrapper
/// - **Serde**: serialized as a JSON string, accepted as string or number;
///   input that would need rounding (more than 28 significant digits) is
///   rejected rather than rounded
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  TapRequest.fare_amount ──► ledger::plan_debit ──► Transaction.amount   │
/// │                                    │                                    │
/// │  Card.balance ─────────────────────┴──► balance_before / balance_after  │
/// │                                                                         │
/// │  TopUpRequest.amount ──► ledger::plan_credit ──► Transaction.amount     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a Money value from whole currency units.
    ///
    /// ```rust
    /// use farelink_core::money::Money;
    ///
    /// assert_eq!(Money::from_units(150).to_string(), "150");
    /// ```
    #[inline]
    pub fn from_units(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Wraps an existing decimal value.
    #[inline]
    pub const fn from_decimal(value: Decimal) -> Self {
        Money(value)
    }

    /// Returns the underlying decimal value.
    #[inline]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is strictly greater than zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is below zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Subtraction that refuses to overflow the decimal range.
    #[inline]
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Addition that refuses to overflow the decimal range.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Canonical text form used for storage.
    ///
    /// Keeps the scale exactly as supplied, so `"12.50"` stays `"12.50"`.
    pub fn to_storage(&self) -> String {
        self.0.to_string()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_exact(s.trim())
            .map(Money)
            .map_err(|e| ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: e.to_string(),
            })
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // serde_json is built with `arbitrary_precision`, so a JSON number
        // still carries its source digits here instead of an f64.
        match Value::deserialize(deserializer)? {
            Value::String(text) => text.parse().map_err(de::Error::custom),
            Value::Number(number) => number.to_string().parse().map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "expected a decimal amount, found {other}"
            ))),
        }
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_units() {
        let money = Money::from_units(500);
        assert_eq!(money.to_string(), "500");
        assert!(money.is_positive());
    }

    #[test]
    fn test_parse_keeps_scale() {
        let money: Money = "12.50".parse().unwrap();
        assert_eq!(money.to_storage(), "12.50");
        assert_eq!(money, Money::from_decimal(Decimal::new(125, 1)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "12,5x".parse::<Money>().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn test_arithmetic_never_rounds() {
        let balance = Money::from_units(150);
        let fare: Money = "12.345".parse().unwrap();

        assert_eq!((balance - fare).to_string(), "137.655");
        assert_eq!((balance - fare + fare), balance);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_units(-1);
        assert!(negative.is_negative());
    }

    #[test]
    fn test_serde_accepts_string_and_number() {
        let from_str: Money = serde_json::from_str("\"150.5\"").unwrap();
        let from_num: Money = serde_json::from_str("150").unwrap();

        assert_eq!(from_str.to_string(), "150.5");
        assert_eq!(from_num, Money::from_units(150));
        assert_eq!(serde_json::to_string(&from_num).unwrap(), "\"150\"");
    }

    #[test]
    fn test_json_number_keeps_every_digit() {
        let fare: Money = serde_json::from_str("12.345678901234567891").unwrap();
        assert_eq!(fare.to_storage(), "12.345678901234567891");

        let scaled: Money = serde_json::from_str("150.50").unwrap();
        assert_eq!(scaled.to_storage(), "150.50");
    }

    #[test]
    fn test_too_precise_input_is_rejected_not_rounded() {
        let digits = "1.234567890123456789012345678901";
        assert!(digits.parse::<Money>().is_err());
        assert!(serde_json::from_str::<Money>(digits).is_err());
        assert!(serde_json::from_str::<Money>(&format!("\"{digits}\"")).is_err());
    }

    #[test]
    fn test_non_numeric_json_rejected() {
        assert!(serde_json::from_str::<Money>("true").is_err());
        assert!(serde_json::from_str::<Money>("\"abc\"").is_err());
    }
}
