//! # Transaction Repository
//!
//! The append-only ledger. Rows are inserted by [`crate::ledger`] inside the
//! same write transaction as the balance change; the schema refuses UPDATE
//! and DELETE on this table.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use farelink_core::{
    GeoFix, Money, Transaction, TransactionStatus, TransactionType, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT,
};

const TRANSACTION_COLUMNS: &str = "id, reference, card_id, vehicle_id, amount, balance_before, \
     balance_after, type, status, device_timestamp, latitude, longitude, location_accuracy, \
     created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
struct TransactionRecord {
    id: i64,
    reference: String,
    card_id: i64,
    vehicle_id: Option<i64>,
    amount: String,
    balance_before: String,
    balance_after: String,
    #[sqlx(rename = "type")]
    kind: TransactionType,
    status: TransactionStatus,
    device_timestamp: DateTime<Utc>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_accuracy: Option<f64>,
    created_at: DateTime<Utc>,
}

fn parse_money(column: &str, value: &str) -> DbResult<Money> {
    value.parse().map_err(|e| DbError::decode(column, e))
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = DbError;

    fn try_from(record: TransactionRecord) -> DbResult<Self> {
        Ok(Transaction {
            id: record.id,
            reference: record.reference,
            card_id: record.card_id,
            vehicle_id: record.vehicle_id,
            amount: parse_money("transactions.amount", &record.amount)?,
            balance_before: parse_money("transactions.balance_before", &record.balance_before)?,
            balance_after: parse_money("transactions.balance_after", &record.balance_after)?,
            kind: record.kind,
            status: record.status,
            device_timestamp: record.device_timestamp,
            latitude: record.latitude,
            longitude: record.longitude,
            location_accuracy: record.location_accuracy,
            created_at: record.created_at,
        })
    }
}

/// A ledger row about to be written.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub card_id: i64,
    pub vehicle_id: Option<i64>,
    pub kind: TransactionType,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub device_timestamp: DateTime<Utc>,
    pub location: Option<GeoFix>,
}

/// Listing filter, newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub card_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub limit: Option<i64>,
}

impl TransactionFilter {
    /// Row limit clamped to `1..=MAX_LIST_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// Appends a completed ledger row on the given connection.
///
/// Generates the UUID v4 reference handed back to the validator.
pub async fn insert(conn: &mut SqliteConnection, new: &NewTransaction) -> DbResult<Transaction> {
    let reference = Uuid::new_v4().to_string();
    let now = Utc::now();
    let (latitude, longitude, accuracy) = match new.location {
        Some(fix) => (Some(fix.latitude), Some(fix.longitude), fix.accuracy),
        None => (None, None, None),
    };

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO transactions (
            reference, card_id, vehicle_id,
            amount, balance_before, balance_after,
            type, status, device_timestamp,
            latitude, longitude, location_accuracy,
            created_at
        ) VALUES (
            ?1, ?2, ?3,
            ?4, ?5, ?6,
            ?7, ?8, ?9,
            ?10, ?11, ?12,
            ?13
        )
        RETURNING id
        "#,
    )
    .bind(&reference)
    .bind(new.card_id)
    .bind(new.vehicle_id)
    .bind(new.amount.to_storage())
    .bind(new.balance_before.to_storage())
    .bind(new.balance_after.to_storage())
    .bind(new.kind)
    .bind(TransactionStatus::Completed)
    .bind(new.device_timestamp)
    .bind(latitude)
    .bind(longitude)
    .bind(accuracy)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Transaction {
        id,
        reference,
        card_id: new.card_id,
        vehicle_id: new.vehicle_id,
        amount: new.amount,
        balance_before: new.balance_before,
        balance_after: new.balance_after,
        kind: new.kind,
        status: TransactionStatus::Completed,
        device_timestamp: new.device_timestamp,
        latitude,
        longitude,
        location_accuracy: accuracy,
        created_at: now,
    })
}

/// Repository for ledger reads.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Gets a ledger row by its reference.
    pub async fn get_by_reference(&self, reference: &str) -> DbResult<Option<Transaction>> {
        let record = sqlx::query_as::<_, TransactionRecord>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE reference = ?1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Transaction::try_from).transpose()
    }

    /// Lists ledger rows newest first.
    pub async fn list(&self, filter: &TransactionFilter) -> DbResult<Vec<Transaction>> {
        let records = sqlx::query_as::<_, TransactionRecord>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE (?1 IS NULL OR card_id = ?1)
              AND (?2 IS NULL OR vehicle_id = ?2)
            ORDER BY id DESC
            LIMIT ?3
            "#
        ))
        .bind(filter.card_id)
        .bind(filter.vehicle_id)
        .bind(filter.effective_limit())
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Transaction::try_from).collect()
    }

    /// Number of ledger rows for a card.
    pub async fn count_for_card(&self, card_id: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE card_id = ?1")
            .bind(card_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::card::NewCard;
    use crate::repository::vehicle::NewVehicle;
    use crate::{Database, DbConfig};

    async fn setup() -> (Database, i64, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let card = db
            .cards()
            .register(&NewCard::active("04A1B2C3", Money::from_units(500)))
            .await
            .unwrap();
        let vehicle = db.vehicles().insert(&NewVehicle::bus("T 1")).await.unwrap();
        (db, card.id, vehicle.id)
    }

    fn fare(card_id: i64, vehicle_id: i64, before: i64, after: i64) -> NewTransaction {
        NewTransaction {
            card_id,
            vehicle_id: Some(vehicle_id),
            kind: TransactionType::FarePayment,
            amount: Money::from_units(before - after),
            balance_before: Money::from_units(before),
            balance_after: Money::from_units(after),
            device_timestamp: Utc::now(),
            location: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup_by_reference() {
        let (db, card_id, vehicle_id) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let mut new = fare(card_id, vehicle_id, 500, 350);
        new.location = Some(GeoFix {
            latitude: -6.8,
            longitude: 39.28,
            accuracy: Some(8.0),
        });

        let tx = insert(&mut conn, &new).await.unwrap();
        drop(conn);

        let loaded = db.transactions().get_by_reference(&tx.reference).await.unwrap().unwrap();
        assert_eq!(loaded.balance_after, Money::from_units(350));
        assert_eq!(loaded.latitude, Some(-6.8));
        assert!(loaded.is_balanced());
        assert!(Uuid::parse_str(&loaded.reference).is_ok());
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let (db, card_id, vehicle_id) = setup().await;
        let other_vehicle = db.vehicles().insert(&NewVehicle::bus("T 2")).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let first = insert(&mut conn, &fare(card_id, vehicle_id, 500, 450)).await.unwrap();
        let second = insert(&mut conn, &fare(card_id, other_vehicle.id, 450, 400)).await.unwrap();
        drop(conn);

        let all = db.transactions().list(&TransactionFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let by_vehicle = db
            .transactions()
            .list(&TransactionFilter {
                vehicle_id: Some(vehicle_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_vehicle.len(), 1);
        assert_eq!(by_vehicle[0].id, first.id);

        let limited = db
            .transactions()
            .list(&TransactionFilter {
                card_id: Some(card_id),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_rows_are_append_only() {
        let (db, card_id, vehicle_id) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let tx = insert(&mut conn, &fare(card_id, vehicle_id, 500, 350)).await.unwrap();

        let update = sqlx::query("UPDATE transactions SET amount = '0' WHERE id = ?1")
            .bind(tx.id)
            .execute(&mut *conn)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(tx.id)
            .execute(&mut *conn)
            .await;
        assert!(delete.is_err());
    }

    #[tokio::test]
    async fn test_unknown_card_violates_foreign_key() {
        let (db, _, vehicle_id) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = insert(&mut conn, &fare(999, vehicle_id, 10, 0)).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[test]
    fn test_limit_clamped() {
        let mut filter = TransactionFilter::default();
        assert_eq!(filter.effective_limit(), DEFAULT_LIST_LIMIT);
        filter.limit = Some(10_000);
        assert_eq!(filter.effective_limit(), MAX_LIST_LIMIT);
        filter.limit = Some(0);
        assert_eq!(filter.effective_limit(), 1);
    }
}
