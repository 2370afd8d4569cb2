//! # Vehicle Repository
//!
//! Read access to vehicles for fare validation, plus the inserts and status
//! changes the seed tool and tests need. Position updates live in
//! [`location`](super::location).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use farelink_core::{TransportType, Vehicle, VehicleStatus};

const VEHICLE_COLUMNS: &str = "id, number, route_name, transport_type, status, owner_id, \
     last_latitude, last_longitude, last_location_update";

#[derive(Debug, Clone, sqlx::FromRow)]
struct VehicleRecord {
    id: i64,
    number: String,
    route_name: Option<String>,
    transport_type: TransportType,
    status: VehicleStatus,
    owner_id: Option<i64>,
    last_latitude: Option<f64>,
    last_longitude: Option<f64>,
    last_location_update: Option<DateTime<Utc>>,
}

impl From<VehicleRecord> for Vehicle {
    fn from(record: VehicleRecord) -> Self {
        Vehicle {
            id: record.id,
            number: record.number,
            route_name: record.route_name,
            transport_type: record.transport_type,
            status: record.status,
            owner_id: record.owner_id,
            last_latitude: record.last_latitude,
            last_longitude: record.last_longitude,
            last_location_update: record.last_location_update,
        }
    }
}

/// Input for adding a vehicle.
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub number: String,
    pub route_name: Option<String>,
    pub transport_type: TransportType,
    pub status: VehicleStatus,
    pub owner_id: Option<i64>,
}

impl NewVehicle {
    /// An active bus with no route or owner.
    pub fn bus(number: impl Into<String>) -> Self {
        NewVehicle {
            number: number.into(),
            route_name: None,
            transport_type: TransportType::Bus,
            status: VehicleStatus::Active,
            owner_id: None,
        }
    }
}

/// Gets a vehicle by id on the given connection.
pub async fn fetch_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Vehicle>> {
    let record = sqlx::query_as::<_, VehicleRecord>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(record.map(Vehicle::from))
}

/// Repository for vehicle database operations.
#[derive(Debug, Clone)]
pub struct VehicleRepository {
    pool: SqlitePool,
}

impl VehicleRepository {
    /// Creates a new VehicleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VehicleRepository { pool }
    }

    /// Adds a vehicle.
    pub async fn insert(&self, vehicle: &NewVehicle) -> DbResult<Vehicle> {
        debug!(number = %vehicle.number, "Inserting vehicle");
        let now = Utc::now();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO vehicles (
                number, route_name, transport_type, status, owner_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING id
            "#,
        )
        .bind(&vehicle.number)
        .bind(&vehicle.route_name)
        .bind(vehicle.transport_type)
        .bind(vehicle.status)
        .bind(vehicle.owner_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, vehicle.number.clone()),
            other => other,
        })?;

        Ok(Vehicle {
            id,
            number: vehicle.number.clone(),
            route_name: vehicle.route_name.clone(),
            transport_type: vehicle.transport_type,
            status: vehicle.status,
            owner_id: vehicle.owner_id,
            last_latitude: None,
            last_longitude: None,
            last_location_update: None,
        })
    }

    /// Gets a vehicle by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Vehicle>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    /// Changes a vehicle's operational status.
    pub async fn set_status(&self, id: i64, status: VehicleStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE vehicles SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Vehicle", id));
        }
        Ok(())
    }
}
