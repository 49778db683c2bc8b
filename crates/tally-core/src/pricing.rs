//! # Line Pricing
//!
//! Computes document line amounts and document totals.
//!
//! ## Line Calculation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  amount    = quantity × unit_price                                      │
//! │  discount  = explicit amount, if given                                  │
//! │              else amount × discount_rate                                │
//! │  taxable   = amount − discount                                          │
//! │  tax       = taxable × tax_rate                                         │
//! │  total     = taxable + tax                                              │
//! │                                                                         │
//! │  Document:                                                              │
//! │  grand_total = Σ amount − Σ discount + Σ tax  (= Σ line total)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rounding happens per line (see [`Money::multiply_quantity`] and
//! [`Money::percentage`]); document totals are plain sums so they always
//! reconcile with the printed lines. Every step is checked: a figure that
//! would leave the i64 cent range is an `Overflow` validation error.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Rate};
use crate::quantity::Quantity;

// =============================================================================
// Line Input
// =============================================================================

/// The priced part of a document line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineInput {
    pub product_id: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    #[serde(default)]
    pub discount_rate: Rate,
    /// Overrides `discount_rate` when present.
    #[serde(default)]
    pub discount_amount: Option<Money>,
    #[serde(default)]
    pub tax_rate: Rate,
}

impl LineInput {
    /// A line with no discount and no tax.
    pub fn new(product_id: impl Into<String>, quantity: Quantity, unit_price: Money) -> Self {
        LineInput {
            product_id: product_id.into(),
            quantity,
            unit_price,
            discount_rate: Rate::zero(),
            discount_amount: None,
            tax_rate: Rate::zero(),
        }
    }

    pub fn with_discount_rate(mut self, rate: Rate) -> Self {
        self.discount_rate = rate;
        self
    }

    pub fn with_discount_amount(mut self, amount: Money) -> Self {
        self.discount_amount = Some(amount);
        self
    }

    pub fn with_tax_rate(mut self, rate: Rate) -> Self {
        self.tax_rate = rate;
        self
    }
}

// =============================================================================
// Line Amounts
// =============================================================================

/// Computed money figures of one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineAmounts {
    pub amount: Money,
    pub discount: Money,
    pub taxable: Money,
    pub tax: Money,
    pub total: Money,
}

/// Prices one line.
///
/// ```rust
/// use tally_core::money::{Money, Rate};
/// use tally_core::pricing::{price_line, LineInput};
/// use tally_core::quantity::Quantity;
///
/// let line = LineInput::new("p-1", Quantity::from_whole(2), Money::from_cents(1000))
///     .with_discount_rate(Rate::from_percent(10))
///     .with_tax_rate(Rate::from_percent(11));
/// let a = price_line(&line).unwrap();
/// assert_eq!(a.amount.cents(), 2000);
/// assert_eq!(a.discount.cents(), 200);
/// assert_eq!(a.tax.cents(), 198);
/// assert_eq!(a.total.cents(), 1998);
/// ```
pub fn price_line(line: &LineInput) -> Result<LineAmounts, ValidationError> {
    let overflow = |figure: &str| ValidationError::overflow(format!("{figure} of product {}", line.product_id));

    let amount = line
        .unit_price
        .multiply_quantity(line.quantity)
        .ok_or_else(|| overflow("line amount"))?;
    let discount = match line.discount_amount {
        Some(explicit) => explicit,
        None => amount
            .percentage(line.discount_rate)
            .ok_or_else(|| overflow("line discount"))?,
    };
    let taxable = amount.checked_sub(discount).ok_or_else(|| overflow("taxable amount"))?;
    let tax = taxable.percentage(line.tax_rate).ok_or_else(|| overflow("line tax"))?;
    let total = taxable.checked_add(tax).ok_or_else(|| overflow("line total"))?;

    Ok(LineAmounts {
        amount,
        discount,
        taxable,
        tax,
        total,
    })
}

// =============================================================================
// Document Totals
// =============================================================================

/// Aggregate figures stored on a document header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentTotals {
    pub total_amount: Money,
    pub total_discount: Money,
    pub total_tax: Money,
    pub grand_total: Money,
}

impl DocumentTotals {
    pub fn from_lines<'a>(
        lines: impl IntoIterator<Item = &'a LineAmounts>,
    ) -> Result<Self, ValidationError> {
        let overflow = || ValidationError::overflow("document total");

        let mut totals = DocumentTotals::default();
        for line in lines {
            totals.total_amount = totals.total_amount.checked_add(line.amount).ok_or_else(overflow)?;
            totals.total_discount = totals.total_discount.checked_add(line.discount).ok_or_else(overflow)?;
            totals.total_tax = totals.total_tax.checked_add(line.tax).ok_or_else(overflow)?;
        }
        totals.grand_total = totals
            .total_amount
            .checked_sub(totals.total_discount)
            .and_then(|net| net.checked_add(totals.total_tax))
            .ok_or_else(overflow)?;
        Ok(totals)
    }
}

/// Change owed for a cash payment.
///
/// Fails with `PaymentInsufficient` when `received < total`.
pub fn compute_change(total: Money, received: Money) -> CoreResult<Money> {
    let change = received
        .checked_sub(total)
        .ok_or_else(|| ValidationError::overflow("change"))?;
    if change.is_negative() {
        return Err(CoreError::PaymentInsufficient {
            total: total.to_string(),
            received: received.to_string(),
        });
    }
    Ok(change)
}

// =============================================================================
// Unit Tests
// =============================================================================
