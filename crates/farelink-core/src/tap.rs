//! # Fare Tap
//!
//! The request a validator sends for one card presentation, its validated
//! form, and the stages the orchestrator moves it through.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Received ──► VehicleValidated ──► CardResolved ──► FundsChecked        │
//! │     │               │                   │               │               │
//! │     ▼               ▼                   ▼               ▼               │
//! │  Rejected        Rejected            Rejected        Rejected           │
//! │                                                                         │
//! │  FundsChecked ──► Debited ──► LocationRecorded? ──► Committed           │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │                   Failed (rollback)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::GeoFix;
use crate::validation::{validate_amount, validate_geo, validate_id};

// =============================================================================
// Options
// =============================================================================

/// Tunables for fare acceptance, injected into the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FareOptions {
    /// Largest single fare accepted; `None` means unbounded.
    pub max_fare: Option<Money>,
}

// =============================================================================
// Request
// =============================================================================

/// Tap request exactly as received from a validator.
///
/// Every field is optional at this level so that missing fields can be
/// reported together instead of failing on the first one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TapRequest {
    pub card_uid: Option<String>,
    pub vehicle_id: Option<i64>,
    pub fare_amount: Option<Money>,
    pub device_timestamp: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_accuracy: Option<f64>,
}

/// A tap that passed field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FareTap {
    pub card_uid: String,
    pub vehicle_id: i64,
    pub fare: Money,
    pub device_timestamp: DateTime<Utc>,
    pub location: Option<GeoFix>,
}

impl TapRequest {
    /// Checks required fields and value ranges.
    ///
    /// `received_at` stands in for a missing device timestamp.
    pub fn validate(&self, options: &FareOptions, received_at: DateTime<Utc>) -> CoreResult<FareTap> {
        let card_uid = self
            .card_uid
            .as_deref()
            .map(str::trim)
            .filter(|uid| !uid.is_empty());

        let mut missing = Vec::new();
        if card_uid.is_none() {
            missing.push("card_uid");
        }
        if self.vehicle_id.is_none() {
            missing.push("vehicle_id");
        }
        if self.fare_amount.is_none() {
            missing.push("fare_amount");
        }

        let (Some(card_uid), Some(vehicle_id), Some(fare)) = (card_uid, self.vehicle_id, self.fare_amount) else {
            return Err(CoreError::missing(missing));
        };

        let vehicle_id = validate_id("vehicle_id", vehicle_id)?;
        let fare = validate_amount("fare_amount", fare, options.max_fare)?;
        let location = validate_geo(self.latitude, self.longitude, self.location_accuracy)?;

        Ok(FareTap {
            card_uid: card_uid.to_string(),
            vehicle_id,
            fare,
            device_timestamp: self.device_timestamp.unwrap_or(received_at),
            location,
        })
    }
}

// =============================================================================
// Stages
// =============================================================================

/// Orchestrator progress for a single tap, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TapStage {
    Received,
    VehicleValidated,
    CardResolved,
    FundsChecked,
    Debited,
    LocationRecorded,
    Committed,
}

impl TapStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TapStage::Received => "received",
            TapStage::VehicleValidated => "vehicle_validated",
            TapStage::CardResolved => "card_resolved",
            TapStage::FundsChecked => "funds_checked",
            TapStage::Debited => "debited",
            TapStage::LocationRecorded => "location_recorded",
            TapStage::Committed => "committed",
        }
    }

    /// Whether a failure at this stage requires rolling back a write.
    ///
    /// Before `Debited` nothing has been written, so a failure is a plain
    /// rejection.
    pub fn requires_rollback(&self) -> bool {
        matches!(
            self,
            TapStage::Debited | TapStage::LocationRecorded | TapStage::Committed
        )
    }
}

impl fmt::Display for TapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
