//! # Write Transactions
//!
//! A pooled connection holding SQLite's write lock from the first statement.
//!
//! ## Why `BEGIN IMMEDIATE`
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two taps, same card, balance 10, fare 10                               │
//! │                                                                         │
//! │  DEFERRED (sqlx default)            IMMEDIATE (this module)             │
//! │  ─────────────────────────────────  ─────────────────────────────────   │
//! │  A: BEGIN; SELECT balance → 10      A: BEGIN IMMEDIATE (lock)           │
//! │  B: BEGIN; SELECT balance → 10      B: BEGIN IMMEDIATE (waits)          │
//! │  A: UPDATE balance = 0; COMMIT      A: SELECT → 10, UPDATE → 0, COMMIT  │
//! │  B: UPDATE → SQLITE_BUSY_SNAPSHOT   B: SELECT → 0 → InsufficientBalance │
//! │     (storage error, not a clean                                         │
//! │      rejection)                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The balance read and the balance write of a tap therefore always happen
//! under the same lock.
//!
//! ## Savepoints
//! Best-effort work inside the transaction (the location update of a tap)
//! runs in a named savepoint so that its failure can be undone without
//! losing the debit.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// An open `BEGIN IMMEDIATE` transaction on a pooled connection.
///
/// Must be finished with [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). If it is dropped while still open (a
/// cancelled request, a panic) the connection is detached from the pool and
/// closed, which makes SQLite discard the uncommitted writes.
#[derive(Debug)]
pub struct WriteTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    /// Acquires a connection and takes the database write lock.
    ///
    /// Waits up to the configured busy timeout for a concurrent writer.
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::TransactionFailed(format!("begin: {e}")))?;

        debug!("Write transaction started");
        Ok(WriteTransaction { conn: Some(conn) })
    }

    /// The connection to run statements on.
    pub fn conn(&mut self) -> DbResult<&mut SqliteConnection> {
        match self.conn.as_mut() {
            Some(conn) => Ok(&mut **conn),
            None => Err(DbError::TransactionFailed(
                "transaction already finished".to_string(),
            )),
        }
    }

    /// Commits and returns the connection to the pool.
    ///
    /// If `COMMIT` itself fails (a deferred constraint, a full disk) the
    /// transaction is rolled back before the error is returned, so the pooled
    /// connection never goes back with a transaction still open.
    pub async fn commit(mut self) -> DbResult<()> {
        let mut conn = self.take()?;

        if let Err(err) = sqlx::query("COMMIT").execute(&mut *conn).await {
            discard(conn).await;
            return Err(DbError::TransactionFailed(format!("commit: {err}")));
        }

        debug!("Write transaction committed");
        Ok(())
    }

    /// Rolls back and returns the connection to the pool.
    pub async fn rollback(mut self) -> DbResult<()> {
        let mut conn = self.take()?;

        if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            warn!(error = %err, "Rollback failed; discarding connection");
            drop(conn.detach());
            return Err(DbError::TransactionFailed(format!("rollback: {err}")));
        }

        debug!("Write transaction rolled back");
        Ok(())
    }

    /// Runs `work` inside `SAVEPOINT name`.
    ///
    /// On `Err` the savepoint is rolled back and released, leaving every
    /// earlier write of the transaction in place. The error is returned to
    /// the caller, who decides whether it is fatal.
    ///
    /// If the savepoint cannot be closed (`RELEASE` or `ROLLBACK TO` fails)
    /// the whole transaction is abandoned: partial writes of `work` must not
    /// reach a later `commit`, which then fails with `TransactionFailed`.
    pub async fn savepoint<T, F>(&mut self, name: &str, work: F) -> DbResult<T>
    where
        F: for<'c> FnOnce(
            &'c mut SqliteConnection,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = DbResult<T>> + Send + 'c>>,
    {
        let conn = self.conn()?;

        sqlx::query(&format!("SAVEPOINT {name}"))
            .execute(&mut *conn)
            .await?;

        let outcome = work(&mut *conn).await;

        let closed = match &outcome {
            Ok(_) => sqlx::query(&format!("RELEASE {name}"))
                .execute(&mut *conn)
                .await
                .map(|_| ()),
            Err(_) => undo_savepoint(conn, name).await,
        };

        if let Err(err) = closed {
            warn!(savepoint = name, error = %err, "Savepoint left open; abandoning transaction");
            if let Some(conn) = self.conn.take() {
                discard(conn).await;
            }
            return Err(DbError::TransactionFailed(format!("savepoint {name}: {err}")));
        }

        outcome
    }

    fn take(&mut self) -> DbResult<PoolConnection<Sqlite>> {
        self.conn.take().ok_or_else(|| {
            DbError::TransactionFailed("transaction already finished".to_string())
        })
    }
}

async fn undo_savepoint(conn: &mut SqliteConnection, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query(&format!("ROLLBACK TO {name}"))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!("RELEASE {name}"))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Ends whatever transaction is open on `conn`. A connection whose state
/// cannot be restored is detached from the pool and closed.
async fn discard(mut conn: PoolConnection<Sqlite>) {
    if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        warn!(error = %err, "Could not roll back; discarding connection");
        drop(conn.detach());
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Write transaction dropped while open; discarding connection");
            drop(conn.detach());
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
