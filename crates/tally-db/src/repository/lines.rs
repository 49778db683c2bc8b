//! Line storage shared by receipts and outbound movements.
//!
//! Both keep identical line tables that differ only in name and owning
//! column; table and column names come from constants, never from input.

use sqlx::{SqliteConnection, SqliteExecutor};

use crate::error::DbResult;
use tally_core::DocumentLine;

/// Where a document family keeps its lines.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineTable {
    pub table: &'static str,
    pub owner_column: &'static str,
}

pub(crate) const RECEIPT_LINES: LineTable = LineTable {
    table: "goods_receipt_lines",
    owner_column: "receipt_id",
};

pub(crate) const OUTBOUND_LINES: LineTable = LineTable {
    table: "stock_out_lines",
    owner_column: "outbound_id",
};

pub(crate) async fn insert_lines(
    conn: &mut SqliteConnection,
    target: LineTable,
    lines: &[DocumentLine],
) -> DbResult<()> {
    let sql = format!(
        "INSERT INTO {} (id, {}, line_no, product_id, quantity_milli, unit_price_cents, \
             discount_rate_bps, discount_cents, tax_rate_bps, tax_cents, amount_cents, line_total_cents) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        target.table, target.owner_column
    );

    for line in lines {
        sqlx::query(&sql)
            .bind(&line.id)
            .bind(&line.document_id)
            .bind(line.line_no)
            .bind(&line.product_id)
            .bind(line.quantity_milli)
            .bind(line.unit_price_cents)
            .bind(line.discount_rate_bps)
            .bind(line.discount_cents)
            .bind(line.tax_rate_bps)
            .bind(line.tax_cents)
            .bind(line.amount_cents)
            .bind(line.line_total_cents)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(crate) async fn select_lines<'e, E: SqliteExecutor<'e>>(
    exec: E,
    target: LineTable,
    document_id: &str,
) -> DbResult<Vec<DocumentLine>> {
    let sql = format!(
        "SELECT id, {owner} AS document_id, line_no, product_id, quantity_milli, unit_price_cents, \
             discount_rate_bps, discount_cents, tax_rate_bps, tax_cents, amount_cents, line_total_cents \
         FROM {table} WHERE {owner} = ?1 ORDER BY line_no",
        owner = target.owner_column,
        table = target.table
    );

    let rows = sqlx::query_as::<_, DocumentLine>(&sql)
        .bind(document_id)
        .fetch_all(exec)
        .await?;

    Ok(rows)
}
