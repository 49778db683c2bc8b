//! # Ledger Error Type
//!
//! One error type for every ledger operation, plus the serialisable body
//! handed to API collaborators.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Ledger                             │
//! │                                                                         │
//! │  tally-core  ── CoreError ─────┐                                       │
//! │  (rules)        ValidationError│                                       │
//! │                                ▼                                       │
//! │  tally-db    ── DbError ──► LedgerError ──► ErrorBody { code, message }│
//! │  (storage)                     ▲                                       │
//! │                                │                                       │
//! │  config      ── ConfigError ───┘                                       │
//! │                                                                         │
//! │  is_transient() == true  →  Ledger::with_retry runs the unit again     │
//! │  anything else           →  returned to the caller as-is               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use crate::config::ConfigError;
use tally_core::{CoreError, ValidationError};
use tally_db::DbError;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Any failure of a ledger operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Business rule or validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure, including detected write conflicts.
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

impl LedgerError {
    /// Whether running the same unit of work again may succeed.
    ///
    /// Only storage conflicts qualify; business-rule failures are final.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Db(e) => e.is_transient(),
            LedgerError::Core(_) | LedgerError::Config(_) => false,
        }
    }

    /// Machine-readable classification.
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::Core(e) => match e {
                CoreError::NotFound { .. } => ErrorCode::NotFound,
                CoreError::InvalidStateTransition { .. } => ErrorCode::InvalidState,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::PeriodClosed { .. } => ErrorCode::PeriodClosed,
                CoreError::MissingReference { .. } => ErrorCode::MissingReference,
                CoreError::PaymentInsufficient { .. } => ErrorCode::PaymentInsufficient,
                CoreError::Unsupported(_) => ErrorCode::Unsupported,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            LedgerError::Db(e) => match e {
                DbError::NotFound { .. } => ErrorCode::NotFound,
                DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                    ErrorCode::ValidationError
                }
                DbError::Conflict { .. } | DbError::PoolExhausted => ErrorCode::Conflict,
                _ => ErrorCode::DatabaseError,
            },
            LedgerError::Config(_) => ErrorCode::ConfigError,
        }
    }
}

// =============================================================================
// Error Body
// =============================================================================

/// Error codes for API responses.
///
/// ## Usage in Frontend
/// ```typescript
/// switch (e.code) {
///   case 'INSUFFICIENT_STOCK': showStockDialog(e.message); break;
///   case 'CONFLICT':           retryLater(); break;
///   default:                   showError(e.message);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    InvalidState,
    InsufficientStock,
    PeriodClosed,
    MissingReference,
    PaymentInsufficient,
    /// Lost update or busy database; safe to retry.
    Conflict,
    Unsupported,
    DatabaseError,
    ConfigError,
}

/// What a collaborator receives when an operation fails.
///
/// ```json
/// { "code": "PERIOD_CLOSED", "message": "Period 2025-01 of warehouse w-1 is closed" }
/// ```
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&LedgerError> for ErrorBody {
    fn from(err: &LedgerError) -> Self {
        let code = err.code();
        let message = match err {
            // Storage internals are logged, not shown
            LedgerError::Db(e) if code == ErrorCode::DatabaseError => {
                tracing::error!(error = %e, "Database operation failed");
                "Database operation failed".to_string()
            }
            other => other.to_string(),
        };
        ErrorBody { code, message }
    }
}

impl From<LedgerError> for ErrorBody {
    fn from(err: LedgerError) -> Self {
        ErrorBody::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Quantity;

    #[test]
    fn test_codes() {
        let err: LedgerError = CoreError::PeriodClosed {
            warehouse_id: "w-1".to_string(),
            period_code: "2025-01".to_string(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::PeriodClosed);
        assert!(!err.is_transient());

        let err: LedgerError = DbError::conflict("balance", "version moved").into();
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert!(err.is_transient());

        let err: LedgerError = ValidationError::required("warehouse_id").into();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_body_names_the_entity() {
        let err: LedgerError = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            warehouse_id: "w-1".to_string(),
            available: Quantity::from_whole(3),
            requested: Quantity::from_whole(10),
        }
        .into();
        let body = ErrorBody::from(&err);
        assert_eq!(body.code, ErrorCode::InsufficientStock);
        assert!(body.message.contains("p-1"));
        assert!(body.message.contains("w-1"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_STOCK");
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err: LedgerError = DbError::QueryFailed("no such column: secret".to_string()).into();
        let body = ErrorBody::from(err);
        assert_eq!(body.code, ErrorCode::DatabaseError);
        assert_eq!(body.message, "Database operation failed");
    }
}
