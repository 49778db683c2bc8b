//! # Document Workflows
//!
//! Three document families, each a small state machine whose transitions
//! post to the stock ledger.
//!
//! ## State Machines
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Receipt / Outbound                                                     │
//! │                                                                         │
//! │    create ──► draft ──confirm──► confirmed ──cancel──► cancelled        │
//! │                 │                  (post)              (reverse)        │
//! │                 └──────────cancel (no ledger effect)──────►┘            │
//! │                                                                         │
//! │  Sales invoice                                                          │
//! │                                                                         │
//! │    create ──► completed ──cancel──► cancelled                           │
//! │               (post SOLD)           (post IN)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Postings per Transition
//! | Document        | Confirm / create            | Cancel                          |
//! |-----------------|-----------------------------|---------------------------------|
//! | Receipt         | IN at warehouse             | OUT at warehouse                |
//! | Outbound        | OUT at source               | IN at source                    |
//! | Outbound/transfer | + IN at destination       | + OUT at destination            |
//! | Sales invoice   | SOLD for stock-tracked lines| IN for stock-tracked lines      |
//!
//! Every function here takes the connection of an open write unit; the
//! caller commits. A failure anywhere leaves the unit to roll back.

pub mod outbound;
pub mod receipt;
pub mod sales;

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::stock;
use tally_core::pricing::{price_line, DocumentTotals, LineAmounts, LineInput};
use tally_core::{CoreError, DocumentLine, PostingKind, Warehouse};
use tally_db::{CatalogRepository, StockProfile};

/// Prices input lines into storable rows owned by `document_id`.
pub(crate) fn price_lines(
    document_id: &str,
    inputs: &[LineInput],
) -> LedgerResult<(Vec<DocumentLine>, DocumentTotals)> {
    let amounts = inputs.iter().map(price_line).collect::<Result<Vec<LineAmounts>, _>>()?;
    let totals = DocumentTotals::from_lines(&amounts)?;

    let lines = inputs
        .iter()
        .zip(&amounts)
        .enumerate()
        .map(|(index, (input, amount))| DocumentLine {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            line_no: index as i64 + 1,
            product_id: input.product_id.clone(),
            quantity_milli: input.quantity.milli(),
            unit_price_cents: input.unit_price.cents(),
            discount_rate_bps: input.discount_rate.bps(),
            discount_cents: amount.discount.cents(),
            tax_rate_bps: input.tax_rate.bps(),
            tax_cents: amount.tax.cents(),
            amount_cents: amount.amount.cents(),
            line_total_cents: amount.total.cents(),
        })
        .collect();

    Ok((lines, totals))
}

pub(crate) async fn require_warehouse(conn: &mut SqliteConnection, warehouse_id: &str) -> LedgerResult<Warehouse> {
    CatalogRepository::find_warehouse(conn, warehouse_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Warehouse", warehouse_id).into())
}

/// Stock profiles of the given products, in input order.
pub(crate) async fn require_products<'a>(
    conn: &mut SqliteConnection,
    product_ids: impl IntoIterator<Item = &'a str>,
) -> LedgerResult<Vec<StockProfile>> {
    let mut profiles = Vec::new();
    for product_id in product_ids {
        let profile = CatalogRepository::stock_profile(&mut *conn, product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", product_id))?;
        profiles.push(profile);
    }
    Ok(profiles)
}

/// Posts every line, in line order, with the same kind.
pub(crate) async fn post_lines(
    conn: &mut SqliteConnection,
    lines: &[DocumentLine],
    warehouse_id: &str,
    kind: PostingKind,
    date: NaiveDate,
) -> LedgerResult<()> {
    for line in lines {
        stock::post(&mut *conn, &line.product_id, warehouse_id, kind, line.quantity(), date).await?;
    }
    Ok(())
}
