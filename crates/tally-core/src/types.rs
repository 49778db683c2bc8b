//! # Domain Types
//!
//! Rows and inputs shared by the ledger engine, the database layer and API
//! collaborators.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog (read-only for the ledger)                                     │
//! │  ┌─────────────┐   ┌─────────────────┐   ┌─────────────────┐           │
//! │  │  Warehouse  │   │    Category     │   │     Product     │           │
//! │  │  id, code   │   │  is_preparation │   │  unit           │           │
//! │  └─────────────┘   └─────────────────┘   │  category_id    │           │
//! │                                          └─────────────────┘           │
//! │  Ledger                                                                 │
//! │  ┌─────────────┐   ┌─────────────────┐   ┌─────────────────┐           │
//! │  │  Sequence   │   │     Period      │   │     Balance     │           │
//! │  │  type+YYMM  │   │  warehouse+code │   │ period+product+ │           │
//! │  │  last_number│   │  is_closed      │   │ warehouse, ver. │           │
//! │  └─────────────┘   └─────────────────┘   └─────────────────┘           │
//! │                                                                         │
//! │  Documents (header + lines + status)                                    │
//! │  ┌─────────────┐   ┌─────────────────┐   ┌─────────────────┐           │
//! │  │   Receipt   │   │ OutboundMovement│   │  SalesInvoice   │           │
//! │  │ draft→conf. │   │  draft→conf.    │   │   completed     │           │
//! │  │   →cancel.  │   │   →cancel.      │   │   →cancelled    │           │
//! │  └─────────────┘   └─────────────────┘   └─────────────────┘           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage Pattern
//! Rows keep the stored integers (`*_milli`, `*_cents`, `*_bps`) as plain
//! fields and expose typed accessors (`quantity()`, `total()`, ...).
//! Documents never reference periods or balances.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::balance::BalanceFigures;
use crate::error::ValidationError;
use crate::money::Money;
use crate::numbering::DocumentType;
use crate::period::PeriodCode;
use crate::pricing::{DocumentTotals, LineInput};
use crate::quantity::Quantity;

// =============================================================================
// Catalog
// =============================================================================

/// A stock location. Every balance is kept per warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Warehouse {
    pub id: String,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Product category.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Made-to-order items; their products are not stock-tracked.
    pub is_preparation: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product as the ledger sees it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    /// Unit of measure ("pcs", "kg", "l").
    pub unit: String,
    pub category_id: Option<String>,
    /// Default selling price in cents.
    pub price_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Ledger Rows
// =============================================================================

/// Counter row for one (document type, YYMM) scope.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sequence {
    pub doc_type: DocumentType,
    pub year_month: String,
    pub prefix: String,
    /// Last issued counter. Never decreases.
    pub last_number: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// An accounting period of one warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Period {
    pub id: String,
    pub warehouse_id: String,
    /// `YYYY-MM`.
    pub period_code: String,
    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub ends_at: DateTime<Utc>,
    pub is_closed: bool,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Period {
    pub fn code(&self) -> Result<PeriodCode, ValidationError> {
        self.period_code.parse()
    }
}

/// Quantity accumulator for one (period, product, warehouse).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Balance {
    pub id: String,
    pub period_id: String,
    /// Copy of the period's code, kept for ordered lookups.
    pub period_code: String,
    pub product_id: String,
    pub warehouse_id: String,
    pub opening_milli: i64,
    pub in_milli: i64,
    pub out_milli: i64,
    pub sold_milli: i64,
    pub closing_milli: i64,
    /// Optimistic lock; bumped on every write.
    pub version: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    pub fn figures(&self) -> BalanceFigures {
        BalanceFigures {
            opening: Quantity::from_milli(self.opening_milli),
            inbound: Quantity::from_milli(self.in_milli),
            outbound: Quantity::from_milli(self.out_milli),
            sold: Quantity::from_milli(self.sold_milli),
            closing: Quantity::from_milli(self.closing_milli),
        }
    }

    #[inline]
    pub fn closing(&self) -> Quantity {
        Quantity::from_milli(self.closing_milli)
    }
}

// =============================================================================
// Status Enums
// =============================================================================

/// Lifecycle of receipts and outbound movements.
///
/// ```text
/// draft ──confirm──► confirmed ──cancel──► cancelled
///   │                                         ▲
///   └──────────────────cancel─────────────────┘
/// ```
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Confirmed,
    Cancelled,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Confirmed => "confirmed",
            DocumentStatus::Cancelled => "cancelled",
        })
    }
}

/// Lifecycle of a sales invoice. There is no draft stage.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Completed,
    Cancelled,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvoiceStatus::Completed => "completed",
            InvoiceStatus::Cancelled => "cancelled",
        })
    }
}

/// What an outbound movement does with the goods.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OutboundKind {
    /// Back to a supplier. Requires `supplier_id`.
    Return,
    /// To another warehouse. Requires `destination_warehouse_id`.
    Transfer,
    /// Write-off.
    Adjustment,
}

impl fmt::Display for OutboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutboundKind::Return => "return",
            OutboundKind::Transfer => "transfer",
            OutboundKind::Adjustment => "adjustment",
        })
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash; change is computed from the amount received.
    Cash,
    /// Bank transfer. Requires a transaction code.
    Transfer,
    /// On account. Requires a customer.
    Credit,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Credit => "credit",
        })
    }
}

// =============================================================================
// Document Lines
// =============================================================================

/// A stored receipt or outbound line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DocumentLine {
    pub id: String,
    /// Owning receipt or outbound movement.
    pub document_id: String,
    pub line_no: i64,
    pub product_id: String,
    pub quantity_milli: i64,
    pub unit_price_cents: i64,
    pub discount_rate_bps: u32,
    pub discount_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_cents: i64,
    pub amount_cents: i64,
    pub line_total_cents: i64,
}

impl DocumentLine {
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// A stored invoice line.
///
/// `stock_tracked` freezes whether the line was posted to the ledger, so a
/// later category change cannot unbalance a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    pub line_no: i64,
    pub product_id: String,
    pub quantity_milli: i64,
    pub unit_price_cents: i64,
    pub discount_rate_bps: u32,
    pub discount_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_cents: i64,
    pub amount_cents: i64,
    pub line_total_cents: i64,
    /// Promotion that produced the unit price, if any.
    pub promotion_id: Option<String>,
    pub stock_tracked: bool,
}

impl InvoiceLine {
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Document Headers
// =============================================================================

/// Goods receipt header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Receipt {
    pub id: String,
    pub number: String,
    #[ts(as = "String")]
    pub doc_date: NaiveDate,
    pub warehouse_id: String,
    pub supplier_id: Option<String>,
    pub notes: Option<String>,
    pub status: DocumentStatus,
    pub total_amount_cents: i64,
    pub total_discount_cents: i64,
    pub total_tax_cents: i64,
    pub grand_total_cents: i64,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
}

impl Receipt {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }
}

/// Outbound movement header (return, transfer or adjustment).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OutboundMovement {
    pub id: String,
    pub number: String,
    #[ts(as = "String")]
    pub doc_date: NaiveDate,
    pub kind: OutboundKind,
    /// Source warehouse.
    pub warehouse_id: String,
    pub destination_warehouse_id: Option<String>,
    pub supplier_id: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: DocumentStatus,
    pub total_amount_cents: i64,
    pub total_discount_cents: i64,
    pub total_tax_cents: i64,
    pub grand_total_cents: i64,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
}

impl OutboundMovement {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }
}

/// Sales invoice header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesInvoice {
    pub id: String,
    pub number: String,
    #[ts(as = "String")]
    pub doc_date: NaiveDate,
    pub warehouse_id: String,
    pub customer_id: Option<String>,
    /// Number of the table order this sale checked out, if any.
    pub table_order_ref: Option<String>,
    pub payment_method: PaymentMethod,
    pub transaction_code: Option<String>,
    pub status: InvoiceStatus,
    pub total_amount_cents: i64,
    pub total_discount_cents: i64,
    pub total_tax_cents: i64,
    pub grand_total_cents: i64,
    pub amount_received_cents: i64,
    pub change_cents: i64,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
}

impl SalesInvoice {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }

    #[inline]
    pub fn change(&self) -> Money {
        Money::from_cents(self.change_cents)
    }
}

// =============================================================================
// Document Views
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptDocument {
    pub header: Receipt,
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OutboundDocument {
    pub header: OutboundMovement,
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesInvoiceDocument {
    pub header: SalesInvoice,
    pub lines: Vec<InvoiceLine>,
}

// =============================================================================
// Inputs
// =============================================================================

/// Request to create a draft goods receipt.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewReceipt {
    #[ts(as = "String")]
    pub doc_date: NaiveDate,
    pub warehouse_id: String,
    pub supplier_id: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<LineInput>,
    pub created_by: String,
}

/// Request to create a draft outbound movement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOutbound {
    #[ts(as = "String")]
    pub doc_date: NaiveDate,
    pub kind: OutboundKind,
    pub warehouse_id: String,
    pub destination_warehouse_id: Option<String>,
    pub supplier_id: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<LineInput>,
    pub created_by: String,
}

/// One sold line: the final unit price plus an optional promotion reference.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineInput {
    #[serde(flatten)]
    pub line: LineInput,
    pub promotion_id: Option<String>,
}

impl From<LineInput> for SaleLineInput {
    fn from(line: LineInput) -> Self {
        SaleLineInput {
            line,
            promotion_id: None,
        }
    }
}

/// Request to create (and complete) a sale, direct or from a table order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    #[ts(as = "String")]
    pub doc_date: NaiveDate,
    pub warehouse_id: String,
    pub customer_id: Option<String>,
    pub table_order_ref: Option<String>,
    pub payment_method: PaymentMethod,
    pub transaction_code: Option<String>,
    /// Required for cash payments.
    pub amount_received: Option<Money>,
    pub notes: Option<String>,
    pub lines: Vec<SaleLineInput>,
    pub created_by: String,
}

/// Totals plus payment figures of a priced sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleSettlement {
    pub totals: DocumentTotals,
    pub amount_received: Money,
    pub change: Money,
}

/// Per-product stock row returned by reporting queries.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevel {
    pub product_id: String,
    pub warehouse_id: String,
    pub period_code: String,
    pub figures: BalanceFigures,
}

impl From<&Balance> for StockLevel {
    fn from(b: &Balance) -> Self {
        StockLevel {
            product_id: b.product_id.clone(),
            warehouse_id: b.warehouse_id.clone(),
            period_code: b.period_code.clone(),
            figures: b.figures(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
