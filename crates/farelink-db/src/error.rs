//! # Storage Errors
//!
//! ```text
//!   sqlx::Error ──From──► DbError ──┐
//!                                   ├──► LedgerError { Storage | Rejected }
//!   CoreError (tap rejection) ──────┘            │
//!                                                ▼
//!                                   ApiError (fare-api, JSON body)
//! ```
//!
//! A `LedgerError::Rejected` never touched a balance; a `Storage` error
//! leaves the write transaction in an unknown state and must be followed by
//! a rollback.

use sqlx::error::ErrorKind;
use thiserror::Error;

use farelink_core::CoreError;

/// Storage failures.
///
/// Apart from `NotFound`, none of these is shown to a validator; the API
/// logs them and answers with a generic persistence failure.
#[derive(Debug, Error)]
pub enum DbError {
    /// A lookup or an UPDATE by id matched no row.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// UNIQUE index hit, e.g. a card UID or vehicle number registered twice.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Ledger or location row pointing at a card/vehicle that is not there.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The file could not be opened or the pool is closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Any other statement failure, including CHECK constraints and the
    /// append-only triggers on `transactions`.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// BEGIN / COMMIT / ROLLBACK / SAVEPOINT failed, or the transaction
    /// guard was used after it finished.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// The balance compare-and-swap found a different balance than the one
    /// read. Only reachable by a writer that skipped `BEGIN IMMEDIATE`.
    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification { entity: String, id: i64 },

    /// A stored value no longer parses into its domain type.
    #[error("Corrupt {column} value: {reason}")]
    Decode { column: String, reason: String },

    /// No pooled connection became free within the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// `NotFound` for an entity kind and the id or UID it was looked up by.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// `UniqueViolation` carrying the offending value.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn decode(column: impl Into<String>, reason: impl ToString) -> Self {
        DbError::Decode {
            column: column.into(),
            reason: reason.to_string(),
        }
    }
}

/// sqlx error classification.
///
/// ```text
/// RowNotFound                  → NotFound
/// Database, kind Unique        → UniqueViolation { field: "<table>.<column>" }
/// Database, kind ForeignKey    → ForeignKeyViolation
/// Database, anything else      → QueryFailed
/// ColumnDecode                 → Decode
/// PoolTimedOut / PoolClosed    → PoolExhausted / ConnectionFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "?"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        // SQLite: "UNIQUE constraint failed: cards.card_uid"
                        field: message
                            .rsplit(": ")
                            .next()
                            .unwrap_or(message.as_str())
                            .to_string(),
                        value: String::new(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    _ => DbError::QueryFailed(message),
                }
            }
            sqlx::Error::ColumnDecode { index, source } => DbError::decode(index, source),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Ledger Error
// =============================================================================

/// Outcome of a failed debit or credit.
///
/// `Rejected` means nothing was written; `Storage` means the write itself
/// failed and the enclosing transaction must be rolled back.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl LedgerError {
    /// Whether the failure is a business rejection rather than a storage fault.
    pub fn is_rejection(&self) -> bool {
        matches!(self, LedgerError::Rejected(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Storage(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_pool_timeout_maps_to_exhausted() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));
    }

    #[test]
    fn test_ledger_error_classification() {
        let rejected: LedgerError = CoreError::missing(["card_uid"]).into();
        assert!(rejected.is_rejection());

        let storage: LedgerError = DbError::PoolExhausted.into();
        assert!(!storage.is_rejection());
    }
}
