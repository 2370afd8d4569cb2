//! # Connection Pool
//!
//! Opens the SQLite file once at startup and hands out pooled connections to
//! repositories and write transactions.
//!
//! ## Who Holds Which Connection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SqlitePool (max_connections, WAL)                     │
//! │                                                                         │
//! │   tap A ─── begin_write() ─── BEGIN IMMEDIATE ── holds write lock       │
//! │   tap B ─── begin_write() ─── BEGIN IMMEDIATE ── sleeps ≤ busy_timeout  │
//! │   GET /transactions ───────── plain SELECT ───── never waits on A or B  │
//! │   GET /cards/resolve ──────── plain SELECT ───── sees last commit       │
//! │                                                                         │
//! │   Taps on the same card are serialized by the write lock, so the second │
//! │   tap reads the balance the first one committed.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `synchronous = NORMAL` is safe under WAL: a power cut can lose the last
//! commits but never corrupts the file.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::card::CardRepository;
use crate::repository::location::LocationRecorder;
use crate::repository::transaction::TransactionRepository;
use crate::repository::vehicle::VehicleRepository;
use crate::tx::WriteTransaction;

// =============================================================================
// Configuration
// =============================================================================

/// Pool and SQLite settings.
///
/// ```rust,ignore
/// let config = DbConfig::new("./data/farelink.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first start. `:memory:` for tests.
    pub database_path: PathBuf,

    /// Upper bound on pooled connections (5).
    pub max_connections: u32,

    /// Connections opened eagerly and kept warm (1).
    pub min_connections: u32,

    /// How long `acquire` may wait for a free connection (30s).
    pub connect_timeout: Duration,

    /// Idle connections above `min_connections` are closed after this (10m).
    pub idle_timeout: Duration,

    /// How long `BEGIN IMMEDIATE` sleeps on a held write lock before
    /// failing with `SQLITE_BUSY` (5s).
    pub busy_timeout: Duration,

    /// Apply embedded migrations in [`Database::new`] (true).
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            ..DbConfig::default()
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Private in-memory database for tests.
    ///
    /// Limited to one connection: each new connection to `:memory:` would
    /// open a separate, empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            ..DbConfig::default()
        }
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = format!("sqlite://{}?mode=rwc", self.database_path.display());

        Ok(SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // off by default in SQLite
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            database_path: PathBuf::from("./data/farelink.db"),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the pool; repositories are created from it on demand.
///
/// Clones share one pool.
///
/// ```rust,ignore
/// let position = state.db.locations().current_position(vehicle_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening fare database");

        let options = config.connect_options()?;
        debug!(busy_timeout_ms = config.busy_timeout.as_millis() as u64, "SQLite options ready");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Pool open");

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a write transaction (`BEGIN IMMEDIATE`) on a pooled connection.
    pub async fn begin_write(&self) -> DbResult<WriteTransaction> {
        WriteTransaction::begin(&self.pool).await
    }

    pub fn cards(&self) -> CardRepository {
        CardRepository::new(self.pool.clone())
    }

    pub fn vehicles(&self) -> VehicleRepository {
        VehicleRepository::new(self.pool.clone())
    }

    /// Ledger rows (read side; rows are written by `ledger`).
    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    pub fn locations(&self) -> LocationRecorder {
        LocationRecorder::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool. Later calls
    /// on any clone fail.
    pub async fn close(&self) {
        info!("Closing fare database");
        self.pool.close().await;
    }

    /// One round trip to SQLite.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|one| one == 1)
            .unwrap_or(false)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
