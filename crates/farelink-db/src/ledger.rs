//! # Fare Ledger (storage half)
//!
//! Applies a debit or credit decided by `farelink_core::ledger` and appends
//! the matching ledger row, on the caller's write-transaction connection.
//!
//! ## Atomicity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WriteTransaction (BEGIN IMMEDIATE)                                     │
//! │    ├── card read (by the caller, same connection)                       │
//! │    ├── plan_debit / plan_credit         ──► Rejected(CoreError)         │
//! │    ├── UPDATE cards ... WHERE balance = before                          │
//! │    └── INSERT INTO transactions         ──► Storage(DbError)            │
//! │  COMMIT (caller)                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither write is visible until the caller commits, so a crash between the
//! balance update and the row insert leaves no trace.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::LedgerError;
use crate::repository::card as cards;
use crate::repository::transaction::{self, NewTransaction};
use farelink_core::ledger::{plan_credit, plan_debit};
use farelink_core::{BalanceChange, Card, GeoFix, Money, Transaction};

/// Context recorded alongside a balance change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerEntry {
    /// `None` for top-ups.
    pub vehicle_id: Option<i64>,
    pub device_timestamp: DateTime<Utc>,
    pub location: Option<GeoFix>,
}

/// A committed-on-success balance change and its ledger row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerReceipt {
    pub change: BalanceChange,
    pub transaction: Transaction,
}

/// Debits `fare` from `card` and appends a `fare_payment` row.
///
/// `card` must have been read on `conn` inside the current write
/// transaction.
///
/// ## Errors
/// - `Rejected(CardNotActive | InsufficientBalance | InvalidAmount)`, nothing written
/// - `Storage(_)`, the caller must roll back
pub async fn debit(
    conn: &mut SqliteConnection,
    card: &Card,
    fare: Money,
    entry: &LedgerEntry,
) -> Result<LedgerReceipt, LedgerError> {
    let change = plan_debit(card, fare)?;
    apply(conn, card, change, entry).await
}

/// Credits `amount` to `card` and appends a `top_up` row.
pub async fn credit(
    conn: &mut SqliteConnection,
    card: &Card,
    amount: Money,
    entry: &LedgerEntry,
) -> Result<LedgerReceipt, LedgerError> {
    let change = plan_credit(card, amount)?;
    apply(conn, card, change, entry).await
}

async fn apply(
    conn: &mut SqliteConnection,
    card: &Card,
    change: BalanceChange,
    entry: &LedgerEntry,
) -> Result<LedgerReceipt, LedgerError> {
    cards::compare_and_set_balance(conn, card.id, change.before, change.after).await?;

    let transaction = transaction::insert(
        conn,
        &NewTransaction {
            card_id: card.id,
            vehicle_id: entry.vehicle_id,
            kind: change.kind,
            amount: change.amount,
            balance_before: change.before,
            balance_after: change.after,
            device_timestamp: entry.device_timestamp,
            location: entry.location,
        },
    )
    .await?;

    debug!(
        card_id = card.id,
        kind = ?change.kind,
        before = %change.before,
        after = %change.after,
        reference = %transaction.reference,
        "Ledger entry written"
    );

    Ok(LedgerReceipt { change, transaction })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::card::NewCard;
    use crate::repository::vehicle::NewVehicle;
    use crate::{Database, DbConfig};
    use farelink_core::{CardStatus, CoreError, TransactionType};

    fn entry(vehicle_id: Option<i64>) -> LedgerEntry {
        LedgerEntry {
            vehicle_id,
            device_timestamp: Utc::now(),
            location: None,
        }
    }

    async fn setup(balance: i64, status: CardStatus) -> (Database, Card, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut new = NewCard::active("04A1B2C3", Money::from_units(balance));
        new.status = status;
        let card = db.cards().register(&new).await.unwrap();
        let vehicle = db.vehicles().insert(&NewVehicle::bus("T 1")).await.unwrap();
        (db, card, vehicle.id)
    }

    #[tokio::test]
    async fn test_debit_commits_balance_and_row_together() {
        let (db, card, vehicle_id) = setup(500, CardStatus::Active).await;

        let mut tx = db.begin_write().await.unwrap();
        let conn = tx.conn().unwrap();
        let card = cards::fetch_by_id(conn, card.id).await.unwrap().unwrap();
        let receipt = debit(conn, &card, Money::from_units(150), &entry(Some(vehicle_id)))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(receipt.change.after, Money::from_units(350));
        assert_eq!(receipt.transaction.kind, TransactionType::FarePayment);

        let stored = db.cards().get_by_id(card.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, Money::from_units(350));
        assert_eq!(db.transactions().count_for_card(card.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rollback_after_debit_leaves_nothing() {
        let (db, card, vehicle_id) = setup(500, CardStatus::Active).await;

        let mut tx = db.begin_write().await.unwrap();
        debit(tx.conn().unwrap(), &card, Money::from_units(150), &entry(Some(vehicle_id)))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let stored = db.cards().get_by_id(card.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, Money::from_units(500));
        assert_eq!(db.transactions().count_for_card(card.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_rejection() {
        let (db, card, vehicle_id) = setup(100, CardStatus::Active).await;

        let mut tx = db.begin_write().await.unwrap();
        let err = debit(tx.conn().unwrap(), &card, Money::from_units(150), &entry(Some(vehicle_id)))
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(
            err,
            LedgerError::Rejected(CoreError::InsufficientBalance { .. })
        ));
        let stored = db.cards().get_by_id(card.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, Money::from_units(100));
    }

    #[tokio::test]
    async fn test_stale_card_is_storage_error() {
        let (db, mut card, vehicle_id) = setup(500, CardStatus::Active).await;
        card.balance = Money::from_units(600);

        let mut tx = db.begin_write().await.unwrap();
        let err = debit(tx.conn().unwrap(), &card, Money::from_units(150), &entry(Some(vehicle_id)))
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, LedgerError::Storage(crate::DbError::ConcurrentModification { .. })));
    }

    #[tokio::test]
    async fn test_credit_writes_top_up_without_vehicle() {
        let (db, card, _) = setup(350, CardStatus::Active).await;

        let mut tx = db.begin_write().await.unwrap();
        let receipt = credit(tx.conn().unwrap(), &card, Money::from_units(150), &entry(None))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(receipt.transaction.kind, TransactionType::TopUp);
        assert_eq!(receipt.transaction.vehicle_id, None);
        assert!(receipt.transaction.is_balanced());
        let stored = db.cards().get_by_id(card.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, Money::from_units(500));
    }

    #[tokio::test]
    async fn test_credit_refuses_blocked_card() {
        let (db, card, _) = setup(0, CardStatus::Blocked).await;

        let mut tx = db.begin_write().await.unwrap();
        let err = credit(tx.conn().unwrap(), &card, Money::from_units(10), &entry(None))
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, LedgerError::Rejected(CoreError::CardNotActive { .. })));
    }
}
