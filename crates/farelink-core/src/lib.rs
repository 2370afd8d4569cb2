//! # farelink-core: Pure Fare Logic for Farelink
//!
//! This crate holds the fare-tap rules as pure functions with zero I/O
//! dependencies: how a reader UID is canonicalized, which card it resolves
//! to, and whether a debit is allowed.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Farelink Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Validators (NFC readers on vehicles)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP / JSON                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  fare-api (axum + FareService)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ farelink-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │    uid    │  │ resolver  │  │  ledger   │  │    tap    │  │   │
//! │  │   │ normalize │  │  cascade  │  │  debit /  │  │ validate  │  │   │
//! │  │   │  reverse  │  │ tie-break │  │  credit   │  │  stages   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 farelink-db (Database Layer)                    │   │
//! │  │        SQLite, migrations, repositories, atomic debit           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Card, Vehicle, Transaction, LocationSample)
//! - [`money`] - Decimal money type (no floating point, no rounding)
//! - [`uid`] - UID Normalizer
//! - [`resolver`] - Card Resolver cascade
//! - [`ledger`] - Debit/credit rules
//! - [`tap`] - Tap request validation and orchestrator stages
//! - [`validation`] - Field-level checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use farelink_core::{ledger, Card, CardResolver, CardStatus, Money};
//!
//! let now = Utc::now();
//! let stored = vec![Card {
//!     id: 1,
//!     uid: "25:0E:8B:1B:08".to_string(),
//!     balance: Money::from_units(500),
//!     status: CardStatus::Active,
//!     customer_id: None,
//!     created_at: now,
//!     updated_at: now,
//! }];
//!
//! // A reader that reports the bytes in reverse order still finds the card
//! let resolution = CardResolver::default().resolve_raw("081b8b0e25", &stored).unwrap();
//! let change = ledger::plan_debit(&resolution.card, Money::from_units(150)).unwrap();
//!
//! assert_eq!(change.after, Money::from_units(350));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod resolver;
pub mod tap;
pub mod types;
pub mod uid;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::BalanceChange;
pub use money::Money;
pub use resolver::{CardResolver, MatchRule, Resolution, ResolverOptions};
pub use tap::{FareOptions, FareTap, TapRequest, TapStage};
pub use types::*;
pub use uid::UidForms;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default number of rows returned by a transaction listing.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Upper bound on rows returned by a transaction listing.
pub const MAX_LIST_LIMIT: i64 = 500;
