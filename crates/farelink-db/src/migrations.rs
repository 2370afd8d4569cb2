//! # Schema Migrations
//!
//! The SQL files under `migrations/sqlite/` are compiled into the binary, so
//! a validator fleet server never depends on files next to the executable.
//!
//! ```text
//! migrations/sqlite/
//!   001_initial_schema.sql   cards, vehicles, transactions (append-only
//!                            triggers), location_samples
//! ```
//!
//! Files are applied in numeric order and recorded in `_sqlx_migrations`;
//! sqlx refuses to start if an applied file was edited afterwards, so schema
//! changes always go in a new `NNN_description.sql`.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Embedded vs applied migration counts, reported by the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub embedded: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }
}

/// Applies every embedded migration not yet recorded.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(embedded = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// Counts applied migrations. A database that was never migrated reports
/// zero applied rather than an error.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let applied: Option<i64> =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_optional(pool)
            .await
            .ok()
            .flatten();

    Ok(MigrationStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: applied.unwrap_or(0) as usize,
    })
}
