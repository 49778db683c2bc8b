//! # Validation Module
//!
//! Workflow preconditions that can be checked before touching storage.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (no I/O)                                         │
//! │  ├── Line shape: non-empty, positive quantity, sane rates              │
//! │  ├── Outbound references: destination / supplier                       │
//! │  └── Payment preconditions: customer / transaction code / tendered     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Workflow reads (inside the write transaction)                │
//! │  ├── Document status                                                   │
//! │  ├── Period open                                                       │
//! │  └── Current stock ≥ requested                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK closing = opening + in − out − sold                         │
//! │  ├── UNIQUE (period, product, warehouse), UNIQUE number                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here is retried: a failure is terminal for the call.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, BPS_PER_WHOLE};
use crate::pricing::LineInput;
use crate::types::{NewOutbound, NewSale, OutboundKind, PaymentMethod};
use crate::MAX_DOCUMENT_LINES;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Rejects empty or whitespace-only identifiers.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Validates a rate (discount or tax) in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_rate_bps;
///
/// assert!(validate_rate_bps("tax_rate", 1100).is_ok());
/// assert!(validate_rate_bps("tax_rate", 10001).is_err());
/// ```
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > BPS_PER_WHOLE {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: BPS_PER_WHOLE as i64,
        });
    }
    Ok(())
}

/// Validates a non-negative money amount (zero is allowed: free items).
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

// =============================================================================
// Line Validators
// =============================================================================

/// Validates a single priced line.
///
/// ## Rules
/// - `product_id` present
/// - Quantity strictly positive (fractions allowed)
/// - Unit price non-negative
/// - Rates within 0..=100 %
/// - `quantity × unit_price` fits in i64 cents
/// - Explicit discount between zero and the line amount
pub fn validate_line(line: &LineInput) -> ValidationResult<()> {
    validate_required("product_id", &line.product_id)?;

    if !line.quantity.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    validate_non_negative("unit_price", line.unit_price)?;
    validate_rate_bps("discount_rate", line.discount_rate.bps())?;
    validate_rate_bps("tax_rate", line.tax_rate.bps())?;

    let amount = line
        .unit_price
        .multiply_quantity(line.quantity)
        .ok_or_else(|| ValidationError::overflow(format!("line amount of product {}", line.product_id)))?;

    if let Some(discount) = line.discount_amount {
        if discount.is_negative() || discount > amount {
            return Err(ValidationError::OutOfRange {
                field: "discount_amount".to_string(),
                min: 0,
                max: amount.cents(),
            });
        }
    }

    Ok(())
}

/// Validates the line list of a document.
///
/// ## Rules
/// - At least one line
/// - At most [`MAX_DOCUMENT_LINES`]
/// - Every line passes [`validate_line`]
pub fn validate_lines<'a>(lines: impl ExactSizeIterator<Item = &'a LineInput>) -> ValidationResult<()> {
    let count = lines.len();
    if count == 0 {
        return Err(ValidationError::required("lines"));
    }
    if count > MAX_DOCUMENT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_DOCUMENT_LINES as i64,
        });
    }

    for line in lines {
        validate_line(line)?;
    }
    Ok(())
}

// =============================================================================
// Document Validators
// =============================================================================

/// Checks the references an outbound movement's kind requires.
///
/// ## Rules
/// ```text
/// transfer   → destination_warehouse_id, different from the source
/// return     → supplier_id
/// adjustment → nothing extra
/// ```
pub fn validate_outbound_references(input: &NewOutbound) -> CoreResult<()> {
    let document = format!("{} outbound", input.kind);

    match input.kind {
        OutboundKind::Transfer => {
            let Some(dest) = input.destination_warehouse_id.as_deref() else {
                return Err(CoreError::missing_reference(document, "destination_warehouse_id"));
            };
            if dest.trim().is_empty() {
                return Err(CoreError::missing_reference(document, "destination_warehouse_id"));
            }
            if dest == input.warehouse_id {
                return Err(ValidationError::invalid_format(
                    "destination_warehouse_id",
                    "must differ from the source warehouse",
                )
                .into());
            }
        }
        OutboundKind::Return => {
            if is_blank(input.supplier_id.as_deref()) {
                return Err(CoreError::missing_reference(document, "supplier_id"));
            }
        }
        OutboundKind::Adjustment => {}
    }

    Ok(())
}

/// Checks payment-method preconditions of a sale.
///
/// ## Rules
/// - `credit` requires a customer
/// - `transfer` requires a transaction code
/// - `cash` requires the amount received
///
/// Whether the cash covers the total is checked after pricing
/// (see [`crate::pricing::compute_change`]).
pub fn validate_payment(input: &NewSale) -> CoreResult<()> {
    let document = format!("{} sale", input.payment_method);

    match input.payment_method {
        PaymentMethod::Credit => {
            if is_blank(input.customer_id.as_deref()) {
                return Err(CoreError::missing_reference(document, "customer_id"));
            }
        }
        PaymentMethod::Transfer => {
            if is_blank(input.transaction_code.as_deref()) {
                return Err(CoreError::missing_reference(document, "transaction_code"));
            }
        }
        PaymentMethod::Cash => match input.amount_received {
            None => return Err(CoreError::missing_reference(document, "amount_received")),
            Some(received) => validate_non_negative("amount_received", received)?,
        },
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Rate;
    use crate::quantity::Quantity;
    use crate::types::SaleLineInput;
    use chrono::NaiveDate;

    fn line() -> LineInput {
        LineInput::new("p-1", Quantity::from_whole(1), Money::from_cents(1000))
    }

    fn outbound(kind: OutboundKind) -> NewOutbound {
        NewOutbound {
            doc_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            kind,
            warehouse_id: "w-1".to_string(),
            destination_warehouse_id: None,
            supplier_id: None,
            reason: None,
            notes: None,
            lines: vec![line()],
            created_by: "tester".to_string(),
        }
    }

    fn sale(method: PaymentMethod) -> NewSale {
        NewSale {
            doc_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            warehouse_id: "w-1".to_string(),
            customer_id: None,
            table_order_ref: None,
            payment_method: method,
            transaction_code: None,
            amount_received: None,
            notes: None,
            lines: vec![SaleLineInput::from(line())],
            created_by: "tester".to_string(),
        }
    }

    #[test]
    fn test_validate_line() {
        assert!(validate_line(&line()).is_ok());

        let mut zero_qty = line();
        zero_qty.quantity = Quantity::zero();
        assert!(matches!(
            validate_line(&zero_qty),
            Err(ValidationError::MustBePositive { .. })
        ));

        assert!(validate_line(&line().with_tax_rate(Rate::from_bps(10_001))).is_err());
        assert!(validate_line(&line().with_discount_amount(Money::from_cents(1001))).is_err());
        assert!(validate_line(&line().with_discount_amount(Money::from_cents(1000))).is_ok());

        let mut blank = line();
        blank.product_id = "  ".to_string();
        assert!(validate_line(&blank).is_err());
    }

    #[test]
    fn test_unpriceable_line_rejected() {
        let huge = LineInput::new(
            "p-1",
            Quantity::from_whole(10_000_000_000),
            Money::from_cents(1_000_000_000_000),
        );
        assert!(matches!(
            validate_line(&huge),
            Err(ValidationError::Overflow { .. })
        ));

        // a free line of any size is fine
        let free = LineInput::new("p-1", Quantity::from_milli(i64::MAX), Money::zero());
        assert!(validate_line(&free).is_ok());
    }

    #[test]
    fn test_validate_lines_bounds() {
        let empty: Vec<LineInput> = vec![];
        assert!(validate_lines(empty.iter()).is_err());

        let many = vec![line(); MAX_DOCUMENT_LINES + 1];
        assert!(validate_lines(many.iter()).is_err());

        let ok = vec![line(); 3];
        assert!(validate_lines(ok.iter()).is_ok());
    }

    #[test]
    fn test_transfer_requires_distinct_destination() {
        let mut input = outbound(OutboundKind::Transfer);
        let err = validate_outbound_references(&input).unwrap_err();
        assert!(matches!(err, CoreError::MissingReference { .. }));
        assert_eq!(err.to_string(), "transfer outbound requires destination_warehouse_id");

        input.destination_warehouse_id = Some("w-1".to_string());
        assert!(matches!(
            validate_outbound_references(&input),
            Err(CoreError::Validation(_))
        ));

        input.destination_warehouse_id = Some("w-2".to_string());
        assert!(validate_outbound_references(&input).is_ok());
    }

    #[test]
    fn test_return_requires_supplier() {
        let mut input = outbound(OutboundKind::Return);
        assert!(validate_outbound_references(&input).is_err());
        input.supplier_id = Some("s-1".to_string());
        assert!(validate_outbound_references(&input).is_ok());

        assert!(validate_outbound_references(&outbound(OutboundKind::Adjustment)).is_ok());
    }

    #[test]
    fn test_payment_preconditions() {
        let mut credit = sale(PaymentMethod::Credit);
        assert!(validate_payment(&credit).is_err());
        credit.customer_id = Some("c-1".to_string());
        assert!(validate_payment(&credit).is_ok());

        let mut transfer = sale(PaymentMethod::Transfer);
        assert!(validate_payment(&transfer).is_err());
        transfer.transaction_code = Some("TRX-99".to_string());
        assert!(validate_payment(&transfer).is_ok());

        let mut cash = sale(PaymentMethod::Cash);
        assert!(validate_payment(&cash).is_err());
        cash.amount_received = Some(Money::from_cents(-1));
        assert!(validate_payment(&cash).is_err());
        cash.amount_received = Some(Money::from_cents(5000));
        assert!(validate_payment(&cash).is_ok());
    }
}
