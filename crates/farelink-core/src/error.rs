//! # Rejections
//!
//! ```text
//!   ValidationError ─► CoreError ─► LedgerError (farelink-db) ─► ApiError (fare-api)
//!   malformed input    tap refused   rejected vs. storage fault    JSON for the device
//! ```
//!
//! Every `CoreError` is a *rejection*: it is raised before any balance is
//! written, so the caller only has to roll back an open transaction.

use thiserror::Error;

use crate::money::Money;
use crate::types::CardStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Reasons a tap (or top-up) is refused.
#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more required request fields are absent.
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// Vehicle does not exist or is not accepting fares.
    ///
    /// ## When This Occurs
    /// - Vehicle ID doesn't exist
    /// - Vehicle status is `inactive` or `maintenance`
    #[error("Vehicle {vehicle_id} not found or not active ({reason})")]
    VehicleNotFound { vehicle_id: i64, reason: String },

    /// The resolver cascade found no card for the reported UID.
    ///
    /// `suggested_uid` is the best normalized form of the input, which an
    /// operator can use to register the card.
    #[error("Card not found for UID (suggested registration UID: {suggested_uid})")]
    CardNotFound { suggested_uid: String },

    /// The card exists but is blocked, expired or lost.
    #[error("Card is {status}")]
    CardNotActive { card_id: i64, status: CardStatus },

    /// The card balance does not cover the fare.
    ///
    /// ## User Workflow
    /// ```text
    /// Tap (fare: 150)
    ///      │
    ///      ▼
    /// Card balance: 100
    ///      │
    ///      ▼
    /// InsufficientBalance { balance: 100, required: 150 }
    ///      │
    ///      ▼
    /// Validator shows: "Insufficient balance"
    /// ```
    #[error("Insufficient balance: {balance} available, {required} required")]
    InsufficientBalance { balance: Money, required: Money },

    /// Amount is zero, negative or beyond the decimal range.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// A field failed its shape check.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn missing<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CoreError::MissingFields {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Per-field input problems found before any lookup runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    /// Zero or negative where only a positive value makes sense.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Coordinates outside the WGS-84 ranges, for instance.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Value exceeds a configured ceiling.
    #[error("{field} must not exceed {max}")]
    TooLarge { field: String, max: String },

    /// Unparsable text, such as a UID with no hex digits.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientBalance {
            balance: Money::from_units(100),
            required: Money::from_units(150),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: 100 available, 150 required"
        );

        let err = CoreError::CardNotActive {
            card_id: 7,
            status: CardStatus::Blocked,
        };
        assert_eq!(err.to_string(), "Card is blocked");
    }

    #[test]
    fn test_missing_fields_lists_all() {
        let err = CoreError::missing(["card_uid", "fare_amount"]);
        assert_eq!(
            err.to_string(),
            "Missing required fields: card_uid, fare_amount"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "card_uid".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
