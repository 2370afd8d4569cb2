//! Health check.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::warn;

use crate::AppState;
use farelink_db::migrations::{migration_status, MigrationStatus};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub migrations: MigrationStatus,
    pub version: &'static str,
}

/// `GET /health`
///
/// 200 when the database answers, 503 otherwise.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = state.db.health_check().await;

    let migrations = match migration_status(state.db.pool()).await {
        Ok(status) => status,
        Err(err) => {
            warn!(error = %err, "Could not read migration status");
            MigrationStatus {
                embedded: 0,
                applied: 0,
            }
        }
    };

    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(HealthResponse {
            status: if database { "ok" } else { "unavailable" },
            database,
            migrations,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
