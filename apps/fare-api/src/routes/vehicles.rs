//! Vehicle location routes.
//!
//! Standalone GPS reports from a validator between taps. These bypass the
//! fare path entirely and are not best-effort: a bad report is an error.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use farelink_core::validation::{validate_geo, validate_id};
use farelink_core::{CoreError, LocationSample};
use farelink_db::{DbError, VehiclePosition};

#[derive(Debug, Default, Deserialize)]
pub struct LocationReport {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct VehicleLocation {
    pub vehicle_id: i64,
    /// `None` until the vehicle has reported once.
    pub position: Option<VehiclePosition>,
}

/// `POST /api/vehicles/{id}/location`
pub async fn report_location(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<LocationReport>, JsonRejection>,
) -> ApiResult<Json<LocationSample>> {
    let Path(vehicle_id) = path?;
    let Json(report) = payload?;
    let vehicle_id = validate_id("vehicle_id", vehicle_id)?;

    let mut missing = Vec::new();
    if report.latitude.is_none() {
        missing.push("latitude");
    }
    if report.longitude.is_none() {
        missing.push("longitude");
    }
    let Some(fix) = validate_geo(report.latitude, report.longitude, report.accuracy)? else {
        return Err(CoreError::missing(missing).into());
    };

    let sample = state
        .db
        .locations()
        .record(vehicle_id, fix)
        .await
        .map_err(|err| unknown_vehicle(err, vehicle_id))?;

    Ok(Json(sample))
}

/// `GET /api/vehicles/{id}/location`
pub async fn current_location(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<VehicleLocation>> {
    let Path(vehicle_id) = path?;

    let position = state
        .db
        .locations()
        .current_position(vehicle_id)
        .await
        .map_err(|err| unknown_vehicle(err, vehicle_id))?;

    Ok(Json(VehicleLocation {
        vehicle_id,
        position,
    }))
}

fn unknown_vehicle(err: DbError, vehicle_id: i64) -> ApiError {
    match err {
        DbError::NotFound { .. } => CoreError::VehicleNotFound {
            vehicle_id,
            reason: "unknown vehicle".to_string(),
        }
        .into(),
        other => other.into(),
    }
}
