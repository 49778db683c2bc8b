//! # tally-ledger: Posting Engine for the Tally Inventory Ledger
//!
//! Numbering, accounting periods, the stock posting primitive and the three
//! document workflows, behind a single [`Ledger`] facade.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  API layer / table-order subsystem (external)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ tally-ledger (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   Ledger ──with_retry──► write unit (Database::begin_write)     │   │
//! │  │                              │                                  │   │
//! │  │        ┌─────────────────────┼──────────────────────┐           │   │
//! │  │        ▼                     ▼                      ▼           │   │
//! │  │   workflow::receipt    workflow::outbound    workflow::sales    │   │
//! │  │        │                     │                      │           │   │
//! │  │        └──────────┬──────────┴──────────┬───────────┘           │   │
//! │  │                   ▼                     ▼                       │   │
//! │  │            sequence::next_number   stock::post                  │   │
//! │  │                                         │                       │   │
//! │  │                                  period::ensure_period          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tally-db (repositories)  ◄──  tally-core (pure rules)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Units of Work
//! Every write on [`Ledger`] opens one write unit, runs the whole operation
//! in it and commits. A failure anywhere rolls everything back: balances,
//! status changes and the document number. Transient failures (lost update,
//! busy database) re-run the unit from the start; business-rule failures are
//! returned immediately.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_ledger::{Ledger, LedgerConfig};
//!
//! let ledger = Ledger::open(&LedgerConfig::load(None)?).await?;
//!
//! let receipt = ledger.create_receipt(&new_receipt).await?;
//! ledger.confirm_receipt(&receipt.header.id, "clerk").await?;
//!
//! let on_hand = ledger.current_stock(&product_id, &warehouse_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod period;
pub mod retry;
pub mod sequence;
pub mod stock;
pub mod telemetry;
pub mod workflow;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, LedgerConfig};
pub use error::{ErrorBody, ErrorCode, LedgerError, LedgerResult};
pub use retry::RetryPolicy;

use chrono::NaiveDate;
use tracing::info;

use crate::retry::with_retry;
use crate::workflow::{outbound, receipt, sales};
use tally_core::{
    Balance, CoreError, DocumentNumber, DocumentType, NewOutbound, NewReceipt, NewSale, OutboundDocument,
    Period, PeriodCode, PostingKind, Quantity, ReceiptDocument, SalesInvoiceDocument, StockLevel,
    ValidationError,
};
use tally_db::Database;

/// Runs `$body` (an expression over the unit's connection) inside a
/// retried write unit and commits it.
macro_rules! write_unit {
    ($self:ident, $operation:literal, |$conn:ident| $body:expr) => {{
        let db = &$self.db;
        with_retry(&$self.retry, $operation, move || async move {
            let mut tx = db.begin_write().await?;
            let $conn = tx.conn();
            let out = $body.await?;
            tx.commit().await?;
            Ok::<_, LedgerError>(out)
        })
        .await
    }};
}

// =============================================================================
// Ledger Facade
// =============================================================================

/// Entry point for every ledger operation.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Database,
    retry: RetryPolicy,
}

impl Ledger {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        Ledger { db, retry }
    }

    /// Opens the database described by `config` and runs migrations.
    pub async fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        let db = Database::new(config.database.db_config()).await?;
        let retry = RetryPolicy::from(&config.ledger);
        info!(max_retries = retry.max_retries, "Ledger opened");
        Ok(Ledger::new(db, retry))
    }

    /// The underlying database, for catalog maintenance and diagnostics.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Numbering
    // =========================================================================

    /// Issues the next number of `doc_type` for the month of `date`.
    ///
    /// Used directly by the table-order subsystem; documents created here
    /// take their numbers inside their own unit.
    pub async fn next_number(&self, doc_type: DocumentType, date: NaiveDate) -> LedgerResult<DocumentNumber> {
        write_unit!(self, "next_number", |conn| sequence::next_number(conn, doc_type, date))
    }

    // =========================================================================
    // Periods
    // =========================================================================

    pub async fn ensure_period(&self, warehouse_id: &str, date: NaiveDate) -> LedgerResult<Period> {
        write_unit!(self, "ensure_period", |conn| period::ensure_period(conn, warehouse_id, date))
    }

    /// Closes a period and returns its successor.
    pub async fn close_period(&self, warehouse_id: &str, code: PeriodCode, actor: &str) -> LedgerResult<Period> {
        write_unit!(self, "close_period", |conn| period::close_period(conn, warehouse_id, code, actor))
    }

    /// Periods of a warehouse, oldest first.
    pub async fn list_periods(&self, warehouse_id: &str) -> LedgerResult<Vec<Period>> {
        Ok(self.db.periods().list(warehouse_id).await?)
    }

    pub async fn get_period(&self, warehouse_id: &str, code: PeriodCode) -> LedgerResult<Period> {
        self.db
            .periods()
            .get(warehouse_id, code)
            .await?
            .ok_or_else(|| CoreError::not_found("Period", format!("{code} of warehouse {warehouse_id}")).into())
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Applies a single posting outside any document.
    pub async fn post(
        &self,
        product_id: &str,
        warehouse_id: &str,
        kind: PostingKind,
        quantity: Quantity,
        date: NaiveDate,
    ) -> LedgerResult<Balance> {
        write_unit!(self, "post", |conn| stock::post(conn, product_id, warehouse_id, kind, quantity, date))
    }

    /// Closing quantity of the latest period for the pair.
    pub async fn current_stock(&self, product_id: &str, warehouse_id: &str) -> LedgerResult<Quantity> {
        Ok(self.db.balances().current_stock(product_id, warehouse_id).await?)
    }

    /// Balance rows of one period, or each product's latest row when no
    /// period is given.
    pub async fn stock_by_warehouse(
        &self,
        warehouse_id: &str,
        period: Option<PeriodCode>,
    ) -> LedgerResult<Vec<StockLevel>> {
        let balances = match period {
            Some(code) => self.db.balances().for_period(warehouse_id, code).await?,
            None => self.db.balances().latest_for_warehouse(warehouse_id).await?,
        };
        Ok(balances.iter().map(StockLevel::from).collect())
    }

    /// Rebuilding balances from documents is not supported.
    pub async fn recalculate_balances(&self, warehouse_id: &str, code: PeriodCode) -> LedgerResult<()> {
        Err(CoreError::Unsupported(format!("recalculate balances for {code} of warehouse {warehouse_id}")).into())
    }

    // =========================================================================
    // Receipts
    // =========================================================================

    pub async fn create_receipt(&self, input: &NewReceipt) -> LedgerResult<ReceiptDocument> {
        write_unit!(self, "create_receipt", |conn| receipt::create(conn, input))
    }

    pub async fn confirm_receipt(&self, id: &str, actor: &str) -> LedgerResult<ReceiptDocument> {
        write_unit!(self, "confirm_receipt", |conn| receipt::confirm(conn, id, actor))
    }

    pub async fn cancel_receipt(&self, id: &str, actor: &str) -> LedgerResult<ReceiptDocument> {
        write_unit!(self, "cancel_receipt", |conn| receipt::cancel(conn, id, actor))
    }

    pub async fn get_receipt(&self, id: &str) -> LedgerResult<ReceiptDocument> {
        self.db
            .receipts()
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Receipt", id).into())
    }

    pub async fn find_receipt_by_number(&self, number: &str) -> LedgerResult<ReceiptDocument> {
        expect_type(number, DocumentType::Receipt)?;
        self.db
            .receipts()
            .get_by_number(number)
            .await?
            .ok_or_else(|| CoreError::not_found("Receipt", number).into())
    }

    // =========================================================================
    // Outbound Movements
    // =========================================================================

    pub async fn create_outbound(&self, input: &NewOutbound) -> LedgerResult<OutboundDocument> {
        write_unit!(self, "create_outbound", |conn| outbound::create(conn, input))
    }

    pub async fn confirm_outbound(&self, id: &str, actor: &str) -> LedgerResult<OutboundDocument> {
        write_unit!(self, "confirm_outbound", |conn| outbound::confirm(conn, id, actor))
    }

    pub async fn cancel_outbound(&self, id: &str, actor: &str) -> LedgerResult<OutboundDocument> {
        write_unit!(self, "cancel_outbound", |conn| outbound::cancel(conn, id, actor))
    }

    pub async fn get_outbound(&self, id: &str) -> LedgerResult<OutboundDocument> {
        self.db
            .outbounds()
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Outbound movement", id).into())
    }

    pub async fn find_outbound_by_number(&self, number: &str) -> LedgerResult<OutboundDocument> {
        expect_type(number, DocumentType::Outbound)?;
        self.db
            .outbounds()
            .get_by_number(number)
            .await?
            .ok_or_else(|| CoreError::not_found("Outbound movement", number).into())
    }

    // =========================================================================
    // Sales
    // =========================================================================

    pub async fn create_sale(&self, input: &NewSale) -> LedgerResult<SalesInvoiceDocument> {
        write_unit!(self, "create_sale", |conn| sales::create_sale(conn, input))
    }

    pub async fn cancel_sale(&self, id: &str, actor: &str) -> LedgerResult<SalesInvoiceDocument> {
        write_unit!(self, "cancel_sale", |conn| sales::cancel_sale(conn, id, actor))
    }

    pub async fn get_sale(&self, id: &str) -> LedgerResult<SalesInvoiceDocument> {
        self.db
            .invoices()
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sales invoice", id).into())
    }

    pub async fn find_sale_by_number(&self, number: &str) -> LedgerResult<SalesInvoiceDocument> {
        expect_type(number, DocumentType::Invoice)?;
        self.db
            .invoices()
            .get_by_number(number)
            .await?
            .ok_or_else(|| CoreError::not_found("Sales invoice", number).into())
    }
}

fn expect_type(number: &str, expected: DocumentType) -> LedgerResult<DocumentNumber> {
    let parsed = DocumentNumber::parse(number)?;
    if parsed.doc_type != expected {
        return Err(ValidationError::invalid_format(
            "document_number",
            format!("{number} is not a {} number", expected.prefix()),
        )
        .into());
    }
    Ok(parsed)
}
