//! # farelink-db: Database Layer for Farelink
//!
//! SQLite persistence for cards, vehicles, the append-only ledger and
//! vehicle positions, plus the write transaction that makes a fare debit
//! atomic.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Farelink Data Flow                               │
//! │                                                                         │
//! │  FareService::tap (fare-api)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   farelink-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CardRepo      │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ VehicleRepo   │    │   _schema    │  │   │
//! │  │   │ WriteTx (tx)  │    │ TransactionRe │    │              │  │   │
//! │  │   │               │    │ LocationRec.  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ledger.rs: debit / credit = balance CAS + ledger row          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │                     ./data/farelink.db                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`tx`] - `BEGIN IMMEDIATE` write transactions and savepoints
//! - [`ledger`] - Atomic debit / credit
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use farelink_db::{ledger, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./data/farelink.db")).await?;
//!
//! let mut tx = db.begin_write().await?;
//! let card = farelink_db::repository::card::fetch_by_id(tx.conn()?, 7).await?;
//! // ... ledger::debit(tx.conn()?, &card, fare, &entry).await ...
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod tx;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, LedgerError};
pub use ledger::{LedgerEntry, LedgerReceipt};
pub use pool::{Database, DbConfig};
pub use tx::WriteTransaction;

// Repository re-exports for convenience
pub use repository::card::{CardRepository, NewCard};
pub use repository::location::{LocationRecorder, VehiclePosition};
pub use repository::transaction::{TransactionFilter, TransactionRepository};
pub use repository::vehicle::{NewVehicle, VehicleRepository};
