//! # Invoice Repository
//!
//! Sales invoices and their lines.
//!
//! ## Invoice Lifecycle
//! ```text
//! insert() ──► completed ──cancel()──► cancelled
//! ```
//! There is no draft: an invoice is inserted already completed, in the same
//! write unit that posts its SOLD quantities.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::{InvoiceLine, InvoiceStatus, SalesInvoice, SalesInvoiceDocument};

const INVOICE_COLUMNS: &str = "id, number, doc_date, warehouse_id, customer_id, table_order_ref, \
     payment_method, transaction_code, status, \
     total_amount_cents, total_discount_cents, total_tax_cents, grand_total_cents, \
     amount_received_cents, change_cents, notes, created_by, created_at, cancelled_at, cancelled_by";

const LINE_COLUMNS: &str = "id, invoice_id, line_no, product_id, quantity_milli, unit_price_cents, \
     discount_rate_bps, discount_cents, tax_rate_bps, tax_cents, amount_cents, line_total_cents, \
     promotion_id, stock_tracked";

/// Repository for sales invoices.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        invoice: &SalesInvoice,
        lines: &[InvoiceLine],
    ) -> DbResult<()> {
        debug!(id = %invoice.id, number = %invoice.number, lines = lines.len(), "Inserting invoice");

        sqlx::query(
            r#"
            INSERT INTO sales_invoices (
                id, number, doc_date, warehouse_id, customer_id, table_order_ref,
                payment_method, transaction_code, status,
                total_amount_cents, total_discount_cents, total_tax_cents, grand_total_cents,
                amount_received_cents, change_cents, notes, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.number)
        .bind(invoice.doc_date)
        .bind(&invoice.warehouse_id)
        .bind(&invoice.customer_id)
        .bind(&invoice.table_order_ref)
        .bind(invoice.payment_method)
        .bind(&invoice.transaction_code)
        .bind(invoice.status)
        .bind(invoice.total_amount_cents)
        .bind(invoice.total_discount_cents)
        .bind(invoice.total_tax_cents)
        .bind(invoice.grand_total_cents)
        .bind(invoice.amount_received_cents)
        .bind(invoice.change_cents)
        .bind(&invoice.notes)
        .bind(&invoice.created_by)
        .bind(invoice.created_at)
        .execute(&mut *conn)
        .await?;

        let sql = format!(
            "INSERT INTO sales_invoice_lines ({LINE_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        );
        for line in lines {
            sqlx::query(&sql)
                .bind(&line.id)
                .bind(&line.invoice_id)
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
                .bind(&line.promotion_id)
                .bind(line.stock_tracked)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    pub async fn find<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<Option<SalesInvoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM sales_invoices WHERE id = ?1");
        let row = sqlx::query_as::<_, SalesInvoice>(&sql)
            .bind(id)
            .fetch_optional(exec)
            .await?;
        Ok(row)
    }

    pub async fn find_by_number<'e, E: SqliteExecutor<'e>>(
        exec: E,
        number: &str,
    ) -> DbResult<Option<SalesInvoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM sales_invoices WHERE number = ?1");
        let row = sqlx::query_as::<_, SalesInvoice>(&sql)
            .bind(number)
            .fetch_optional(exec)
            .await?;
        Ok(row)
    }

    pub async fn lines<'e, E: SqliteExecutor<'e>>(exec: E, invoice_id: &str) -> DbResult<Vec<InvoiceLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM sales_invoice_lines WHERE invoice_id = ?1 ORDER BY line_no"
        );
        let rows = sqlx::query_as::<_, InvoiceLine>(&sql)
            .bind(invoice_id)
            .fetch_all(exec)
            .await?;
        Ok(rows)
    }

    /// completed → cancelled. Returns `false` if it was not completed.
    pub async fn mark_cancelled<'e, E: SqliteExecutor<'e>>(
        exec: E,
        id: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE sales_invoices
            SET status = ?1, cancelled_at = ?2, cancelled_by = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(InvoiceStatus::Cancelled)
        .bind(at)
        .bind(actor)
        .bind(id)
        .bind(InvoiceStatus::Completed)
        .execute(exec)
        .await?
        .rows_affected();

        Ok(affected == 1)
    }

    // =========================================================================
    // Pool-level reads
    // =========================================================================

    async fn load(
        conn: &mut SqliteConnection,
        header: Option<SalesInvoice>,
    ) -> DbResult<Option<SalesInvoiceDocument>> {
        let Some(header) = header else {
            return Ok(None);
        };
        let lines = Self::lines(&mut *conn, &header.id).await?;
        Ok(Some(SalesInvoiceDocument { header, lines }))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<SalesInvoiceDocument>> {
        let mut conn = self.pool.acquire().await?;
        let header = Self::find(&mut *conn, id).await?;
        Self::load(&mut conn, header).await
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<SalesInvoiceDocument>> {
        let mut conn = self.pool.acquire().await?;
        let header = Self::find_by_number(&mut *conn, number).await?;
        Self::load(&mut conn, header).await
    }

    /// Invoices produced by one table-order checkout.
    pub async fn for_table_order(&self, table_order_ref: &str) -> DbResult<Vec<SalesInvoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM sales_invoices WHERE table_order_ref = ?1 ORDER BY number"
        );
        let rows = sqlx::query_as::<_, SalesInvoice>(&sql)
            .bind(table_order_ref)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
