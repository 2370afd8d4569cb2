//! # HTTP Errors
//!
//! Every handler returns `ApiResult<T>`. Rejections become a status plus a
//! JSON body with a stable `code`:
//!
//! ```text
//!   CoreError::MissingFields        → 400 MISSING_FIELDS
//!   CoreError::Validation / amount  → 400 VALIDATION_ERROR
//!   CoreError::VehicleNotFound      → 404 VEHICLE_NOT_FOUND
//!   CoreError::CardNotFound         → 404 CARD_NOT_FOUND (+ suggested_uid)
//!   CoreError::CardNotActive        → 403 CARD_NOT_ACTIVE
//!   CoreError::InsufficientBalance  → 402 INSUFFICIENT_BALANCE
//!   DbError::NotFound               → 404 NOT_FOUND
//!   any other DbError               → 500 PERSISTENCE_FAILURE
//! ```
//!
//! Storage failures never leak details to the device: the cause is logged at
//! `error` and the body carries a generic message.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use farelink_core::{CoreError, ValidationError};
use farelink_db::{DbError, LedgerError};

/// Error body returned to validators and operators.
///
/// ```json
/// {
///   "code": "CARD_NOT_FOUND",
///   "message": "Card not found for UID (suggested registration UID: 250E8B1B08)",
///   "suggested_uid": "250E8B1B08"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Normalized UID an operator can register, on `CARD_NOT_FOUND` only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_uid: Option<String>,
}

/// Stable codes validators branch on. Renaming one is a wire break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Required request fields absent (400)
    MissingFields,

    /// Field present but malformed or out of range (400)
    ValidationError,

    /// Vehicle absent or not accepting fares (404)
    VehicleNotFound,

    /// Resolver cascade exhausted (404)
    CardNotFound,

    /// Card blocked, expired or lost (403)
    CardNotActive,

    /// Balance does not cover the fare (402)
    InsufficientBalance,

    /// Other missing resource (404)
    NotFound,

    /// Storage failure, details only in the log (500)
    PersistenceFailure,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::MissingFields | ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::VehicleNotFound | ErrorCode::CardNotFound | ErrorCode::NotFound => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::CardNotActive => StatusCode::FORBIDDEN,
            ErrorCode::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::PersistenceFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            suggested_uid: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates the generic persistence failure.
    pub fn persistence() -> Self {
        ApiError::new(ErrorCode::PersistenceFailure, "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Converts core rejections to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::MissingFields { .. } => ApiError::new(ErrorCode::MissingFields, message),
            CoreError::VehicleNotFound { .. } => ApiError::new(ErrorCode::VehicleNotFound, message),
            CoreError::CardNotFound { suggested_uid } => ApiError {
                code: ErrorCode::CardNotFound,
                message,
                suggested_uid: Some(suggested_uid),
            },
            CoreError::CardNotActive { .. } => ApiError::new(ErrorCode::CardNotActive, message),
            CoreError::InsufficientBalance { .. } => {
                ApiError::new(ErrorCode::InsufficientBalance, message)
            }
            CoreError::InvalidAmount { .. } | CoreError::Validation(_) => {
                ApiError::validation(message)
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Only `NotFound` keeps its message; everything else is logged and
/// replaced by the generic persistence failure.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, err.to_string()),
            other => {
                tracing::error!(error = %other, "Persistence failure");
                ApiError::persistence()
            }
        }
    }
}

// Extractor rejections keep the JSON error shape instead of axum's plain text.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(core) => core.into(),
            LedgerError::Storage(db) => db.into(),
        }
    }
}

/// Convenience type alias for handler results.
pub type ApiResult<T> = Result<T, ApiError>;
