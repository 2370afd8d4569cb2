//! # Location Recorder
//!
//! Refreshes a vehicle's cached position and appends a history sample.
//!
//! ```text
//! record(vehicle_id, fix)
//!   ├── UPDATE vehicles SET last_latitude, last_longitude, last_location_update
//!   │     (last write wins, no ordering between validators)
//!   └── INSERT INTO location_samples
//! ```
//!
//! Within a tap this runs on the tap's connection inside a savepoint and is
//! best-effort. A standalone GPS report gets its own write transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::tx::WriteTransaction;
use farelink_core::{GeoFix, LocationSample};

/// A vehicle's last known position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehiclePosition {
    pub vehicle_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PositionRecord {
    id: i64,
    last_latitude: Option<f64>,
    last_longitude: Option<f64>,
    last_location_update: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct SampleRecord {
    id: i64,
    vehicle_id: i64,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    recorded_at: DateTime<Utc>,
}

impl From<SampleRecord> for LocationSample {
    fn from(record: SampleRecord) -> Self {
        LocationSample {
            id: record.id,
            vehicle_id: record.vehicle_id,
            latitude: record.latitude,
            longitude: record.longitude,
            accuracy: record.accuracy,
            recorded_at: record.recorded_at,
        }
    }
}

/// Updates the cached position and appends a sample on the given connection.
///
/// ## Errors
/// `DbError::NotFound` if the vehicle does not exist.
pub async fn record(
    conn: &mut SqliteConnection,
    vehicle_id: i64,
    fix: GeoFix,
    recorded_at: DateTime<Utc>,
) -> DbResult<LocationSample> {
    let result = sqlx::query(
        r#"
        UPDATE vehicles
        SET last_latitude = ?2, last_longitude = ?3, last_location_update = ?4
        WHERE id = ?1
        "#,
    )
    .bind(vehicle_id)
    .bind(fix.latitude)
    .bind(fix.longitude)
    .bind(recorded_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Vehicle", vehicle_id));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO location_samples (vehicle_id, latitude, longitude, accuracy, recorded_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id
        "#,
    )
    .bind(vehicle_id)
    .bind(fix.latitude)
    .bind(fix.longitude)
    .bind(fix.accuracy)
    .bind(recorded_at)
    .fetch_one(&mut *conn)
    .await?;

    debug!(vehicle_id, sample_id = id, "Vehicle location recorded");

    Ok(LocationSample {
        id,
        vehicle_id,
        latitude: fix.latitude,
        longitude: fix.longitude,
        accuracy: fix.accuracy,
        recorded_at,
    })
}

/// Location reads and standalone location writes.
#[derive(Debug, Clone)]
pub struct LocationRecorder {
    pool: SqlitePool,
}

impl LocationRecorder {
    /// Creates a new LocationRecorder.
    pub fn new(pool: SqlitePool) -> Self {
        LocationRecorder { pool }
    }

    /// Records a GPS report outside of any tap, in its own transaction.
    pub async fn record(&self, vehicle_id: i64, fix: GeoFix) -> DbResult<LocationSample> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let outcome = record(tx.conn()?, vehicle_id, fix, Utc::now()).await;
        match outcome {
            Ok(sample) => {
                tx.commit().await?;
                Ok(sample)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    /// The vehicle's cached position.
    ///
    /// Returns `Ok(None)` when the vehicle exists but has never reported.
    ///
    /// ## Errors
    /// `DbError::NotFound` if the vehicle does not exist.
    pub async fn current_position(&self, vehicle_id: i64) -> DbResult<Option<VehiclePosition>> {
        let record = sqlx::query_as::<_, PositionRecord>(
            r#"
            SELECT id, last_latitude, last_longitude, last_location_update
            FROM vehicles
            WHERE id = ?1
            "#,
        )
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Vehicle", vehicle_id))?;

        Ok(match (record.last_latitude, record.last_longitude, record.last_location_update) {
            (Some(latitude), Some(longitude), Some(updated_at)) => Some(VehiclePosition {
                vehicle_id: record.id,
                latitude,
                longitude,
                updated_at,
            }),
            _ => None,
        })
    }

    /// Most recent history samples for a vehicle, newest first.
    pub async fn recent_samples(&self, vehicle_id: i64, limit: i64) -> DbResult<Vec<LocationSample>> {
        let records = sqlx::query_as::<_, SampleRecord>(
            r#"
            SELECT id, vehicle_id, latitude, longitude, accuracy, recorded_at
            FROM location_samples
            WHERE vehicle_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(vehicle_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(LocationSample::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::vehicle::NewVehicle;
    use crate::{Database, DbConfig};

    fn fix(latitude: f64, longitude: f64) -> GeoFix {
        GeoFix {
            latitude,
            longitude,
            accuracy: Some(5.0),
        }
    }

    #[tokio::test]
    async fn test_record_updates_cache_and_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let vehicle = db.vehicles().insert(&NewVehicle::bus("T 1")).await.unwrap();
        let recorder = db.locations();

        assert_eq!(recorder.current_position(vehicle.id).await.unwrap(), None);

        recorder.record(vehicle.id, fix(-6.80, 39.28)).await.unwrap();
        recorder.record(vehicle.id, fix(-6.81, 39.29)).await.unwrap();

        let position = recorder.current_position(vehicle.id).await.unwrap().unwrap();
        assert_eq!(position.latitude, -6.81);
        assert_eq!(position.longitude, 39.29);

        let samples = recorder.recent_samples(vehicle.id, 10).await.unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].latitude, -6.81);
    }

    #[tokio::test]
    async fn test_unknown_vehicle_writes_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let recorder = db.locations();

        let err = recorder.record(77, fix(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert!(matches!(
            recorder.current_position(77).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(recorder.recent_samples(77, 10).await.unwrap().is_empty());
    }
}
