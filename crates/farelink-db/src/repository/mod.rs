//! # Repository Module
//!
//! Database repository implementations for Farelink.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two ways into the same SQL                           │
//! │                                                                         │
//! │  db.cards().get_by_id(7)            pool-level, one-off reads/writes    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  card::fetch_by_id(&mut conn, 7)    connection-level, used inside a     │
//! │                                     WriteTransaction so the read and    │
//! │                                     the write share one lock            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CardRepository`](card::CardRepository) - Card registration and resolver candidate search
//! - [`VehicleRepository`](vehicle::VehicleRepository) - Vehicle lookups
//! - [`TransactionRepository`](transaction::TransactionRepository) - Append-only ledger
//! - [`LocationRecorder`](location::LocationRecorder) - Vehicle position cache and history

pub mod card;
pub mod location;
pub mod transaction;
pub mod vehicle;
