//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule failures                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  tally-ledger errors                                                   │
//! │  └── LedgerError      - What API collaborators see (code + message)    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy
//! | Class       | Variants                                              |
//! |-------------|-------------------------------------------------------|
//! | validation  | `Validation`, `MissingReference`, `PaymentInsufficient` |
//! | state       | `InvalidStateTransition`                              |
//! | resource    | `InsufficientStock`, `PeriodClosed`, `NotFound`        |
//!
//! Every message names the entity it is about (document number, period code,
//! product/warehouse pair) so the caller can render something actionable.

use thiserror::Error;

use crate::quantity::Quantity;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the ledger and its workflows.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The document (or period) is in the wrong state for the operation.
    ///
    /// ## When This Occurs
    /// - Confirming a receipt that is already confirmed
    /// - Cancelling an already-cancelled document
    /// - Closing a period twice
    #[error("{document} is {status}, cannot {operation}")]
    InvalidStateTransition {
        document: String,
        status: String,
        operation: String,
    },

    /// Not enough stock at the source warehouse.
    ///
    /// ## User Workflow
    /// ```text
    /// Confirm stock-out (qty: 5)
    ///      │
    ///      ▼
    /// current_stock(P, W) = 3
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Nothing is posted, document stays draft
    /// ```
    #[error(
        "Insufficient stock for product {product_id} at warehouse {warehouse_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        warehouse_id: String,
        available: Quantity,
        requested: Quantity,
    },

    /// A posting targeted a closed accounting period.
    #[error("Period {period_code} of warehouse {warehouse_id} is closed")]
    PeriodClosed {
        warehouse_id: String,
        period_code: String,
    },

    /// A reference the document type requires was not supplied.
    ///
    /// ## When This Occurs
    /// - Transfer without destination warehouse
    /// - Return without supplier
    /// - Credit sale without customer
    /// - Bank-transfer sale without transaction code
    #[error("{document} requires {reference}")]
    MissingReference { document: String, reference: String },

    /// Cash received does not cover the invoice total.
    #[error("Payment insufficient: total {total}, received {received}")]
    PaymentInsufficient { total: String, received: String },

    /// Operation is deliberately not supported.
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidStateTransition error.
    pub fn invalid_state(
        document: impl Into<String>,
        status: impl std::fmt::Display,
        operation: impl Into<String>,
    ) -> Self {
        CoreError::InvalidStateTransition {
            document: document.into(),
            status: status.to_string(),
            operation: operation.into(),
        }
    }

    /// Creates a MissingReference error.
    pub fn missing_reference(document: impl Into<String>, reference: impl Into<String>) -> Self {
        CoreError::MissingReference {
            document: document.into(),
            reference: reference.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before anything is persisted.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., malformed period code or document number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Arithmetic on the value would leave the i64 range.
    #[error("{field} exceeds the supported range")]
    Overflow { field: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn overflow(field: impl Into<String>) -> Self {
        ValidationError::Overflow {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_names_the_pair() {
        let err = CoreError::InsufficientStock {
            product_id: "P-1".to_string(),
            warehouse_id: "W-1".to_string(),
            available: Quantity::from_whole(3),
            requested: Quantity::from_whole(10),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product P-1 at warehouse W-1: available 3, requested 10"
        );
    }

    #[test]
    fn test_period_closed_names_the_code() {
        let err = CoreError::PeriodClosed {
            warehouse_id: "W-1".to_string(),
            period_code: "2025-01".to_string(),
        };
        assert_eq!(err.to_string(), "Period 2025-01 of warehouse W-1 is closed");
    }

    #[test]
    fn test_invalid_state_message() {
        let err = CoreError::invalid_state("Receipt GR/2501/0001", "cancelled", "cancel");
        assert_eq!(
            err.to_string(),
            "Receipt GR/2501/0001 is cancelled, cannot cancel"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("warehouse_id").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: warehouse_id is required");
    }
}
