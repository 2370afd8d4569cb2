//! # Domain Types
//!
//! Core domain types used throughout Farelink.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Card       │   │     Vehicle     │   │   Transaction   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64)       │   │  id (i64)       │   │  id (i64)       │       │
//! │  │  uid (as read)  │   │  number         │   │  reference      │       │
//! │  │  balance        │   │  transport_type │   │  balance_before │       │
//! │  │  status         │   │  last position  │   │  balance_after  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   CardStatus    │   │  VehicleStatus  │   │ LocationSample  │       │
//! │  │  Active         │   │  Active         │   │  vehicle_id     │       │
//! │  │  Blocked        │   │  Inactive       │   │  lat / lon      │       │
//! │  │  Expired / Lost │   │  Maintenance    │   │  recorded_at    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cards and vehicles are administered elsewhere; the fare core only reads
//! cards and refreshes a vehicle's cached position. Transactions and
//! location samples are append-only and written exclusively by the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Card
// =============================================================================

/// Lifecycle status of an NFC card. Cards are never deleted, only retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Blocked,
    Expired,
    Lost,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Blocked => "blocked",
            CardStatus::Expired => "expired",
            CardStatus::Lost => "lost",
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, CardStatus::Active)
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored-value NFC card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,

    /// UID exactly as captured at registration (not normalized at rest).
    pub uid: String,

    /// Current balance. Never negative.
    pub balance: Money,

    pub status: CardStatus,

    /// Owning customer, if the card has been assigned.
    pub customer_id: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Vehicle
// =============================================================================

/// Kind of vehicle a validator is mounted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    #[default]
    Bus,
    Plane,
    Ship,
}

/// Operational status of a vehicle. Only `Active` vehicles accept fares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Active,
    Inactive,
    Maintenance,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Active => "active",
            VehicleStatus::Inactive => "inactive",
            VehicleStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bus, plane or ship carrying one or more validators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,

    /// Human label painted on the vehicle.
    pub number: String,

    pub route_name: Option<String>,
    pub transport_type: TransportType,
    pub status: VehicleStatus,

    /// Operator that receives the fare revenue.
    pub owner_id: Option<i64>,

    /// Last known position (most recent write wins).
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
}

impl Vehicle {
    /// Whether a tap on this vehicle may be charged.
    #[inline]
    pub fn accepts_fares(&self) -> bool {
        self.status == VehicleStatus::Active
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Ledger entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    FarePayment,
    TopUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Failed,
}

/// Optional GPS fix reported with a tap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

/// Append-only ledger row. Immutable once written.
///
/// ## Invariant
/// - `FarePayment`: `balance_after = balance_before - amount`
/// - `TopUp`:       `balance_after = balance_before + amount`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,

    /// Opaque reference handed back to the validator (UUID v4).
    pub reference: String,

    pub card_id: i64,

    /// `None` for top-ups.
    pub vehicle_id: Option<i64>,

    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,

    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,

    /// Time reported by the validator (receipt time when absent).
    pub device_timestamp: DateTime<Utc>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_accuracy: Option<f64>,

    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Checks the balance invariant for this row.
    pub fn is_balanced(&self) -> bool {
        match self.kind {
            TransactionType::FarePayment => self.balance_after == self.balance_before - self.amount,
            TransactionType::TopUp => self.balance_after == self.balance_before + self.amount,
        }
    }
}

// =============================================================================
// Location Sample
// =============================================================================

/// One row of a vehicle's position history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub id: i64,
    pub vehicle_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
