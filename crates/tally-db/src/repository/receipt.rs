//! # Receipt Repository
//!
//! Goods receipts and their lines.
//!
//! ## Receipt Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE   insert()                 → status draft, no ledger effect │
//! │  2. CONFIRM  transition(draft→confirmed) + IN postings (ledger crate)  │
//! │  3. CANCEL   transition(confirmed→cancelled) + OUT postings            │
//! │              transition(draft→cancelled), nothing to reverse           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transitions are guarded by the expected current status, so a transition
//! that lost a race updates nothing and reports `false`.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::lines::{insert_lines, select_lines, RECEIPT_LINES};
use tally_core::{DocumentLine, DocumentStatus, Receipt, ReceiptDocument};

const RECEIPT_COLUMNS: &str = "id, number, doc_date, warehouse_id, supplier_id, notes, status, \
     total_amount_cents, total_discount_cents, total_tax_cents, grand_total_cents, \
     created_by, created_at, confirmed_at, confirmed_by, cancelled_at, cancelled_by";

/// Repository for goods receipts.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    /// Inserts a header and its lines.
    pub async fn insert(
        conn: &mut SqliteConnection,
        receipt: &Receipt,
        lines: &[DocumentLine],
    ) -> DbResult<()> {
        debug!(id = %receipt.id, number = %receipt.number, lines = lines.len(), "Inserting receipt");

        sqlx::query(
            r#"
            INSERT INTO goods_receipts (
                id, number, doc_date, warehouse_id, supplier_id, notes, status,
                total_amount_cents, total_discount_cents, total_tax_cents, grand_total_cents,
                created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.number)
        .bind(receipt.doc_date)
        .bind(&receipt.warehouse_id)
        .bind(&receipt.supplier_id)
        .bind(&receipt.notes)
        .bind(receipt.status)
        .bind(receipt.total_amount_cents)
        .bind(receipt.total_discount_cents)
        .bind(receipt.total_tax_cents)
        .bind(receipt.grand_total_cents)
        .bind(&receipt.created_by)
        .bind(receipt.created_at)
        .execute(&mut *conn)
        .await?;

        insert_lines(conn, RECEIPT_LINES, lines).await
    }

    pub async fn find<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<Option<Receipt>> {
        let sql = format!("SELECT {RECEIPT_COLUMNS} FROM goods_receipts WHERE id = ?1");
        let row = sqlx::query_as::<_, Receipt>(&sql)
            .bind(id)
            .fetch_optional(exec)
            .await?;
        Ok(row)
    }

    pub async fn find_by_number<'e, E: SqliteExecutor<'e>>(
        exec: E,
        number: &str,
    ) -> DbResult<Option<Receipt>> {
        let sql = format!("SELECT {RECEIPT_COLUMNS} FROM goods_receipts WHERE number = ?1");
        let row = sqlx::query_as::<_, Receipt>(&sql)
            .bind(number)
            .fetch_optional(exec)
            .await?;
        Ok(row)
    }

    pub async fn lines<'e, E: SqliteExecutor<'e>>(exec: E, receipt_id: &str) -> DbResult<Vec<DocumentLine>> {
        select_lines(exec, RECEIPT_LINES, receipt_id).await
    }

    /// Moves `from` → `to`, stamping who and when.
    ///
    /// Returns `false` if the receipt was not in `from`.
    pub async fn transition<'e, E: SqliteExecutor<'e>>(
        exec: E,
        id: &str,
        from: DocumentStatus,
        to: DocumentStatus,
        actor: &str,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let sql = match to {
            DocumentStatus::Confirmed => {
                "UPDATE goods_receipts SET status = ?1, confirmed_at = ?2, confirmed_by = ?3 \
                 WHERE id = ?4 AND status = ?5"
            }
            DocumentStatus::Cancelled => {
                "UPDATE goods_receipts SET status = ?1, cancelled_at = ?2, cancelled_by = ?3 \
                 WHERE id = ?4 AND status = ?5"
            }
            DocumentStatus::Draft => return Ok(false),
        };

        let affected = sqlx::query(sql)
            .bind(to)
            .bind(at)
            .bind(actor)
            .bind(id)
            .bind(from)
            .execute(exec)
            .await?
            .rows_affected();

        Ok(affected == 1)
    }

    // =========================================================================
    // Pool-level reads
    // =========================================================================

    async fn load(conn: &mut SqliteConnection, header: Option<Receipt>) -> DbResult<Option<ReceiptDocument>> {
        let Some(header) = header else {
            return Ok(None);
        };
        let lines = Self::lines(&mut *conn, &header.id).await?;
        Ok(Some(ReceiptDocument { header, lines }))
    }

    /// Header and lines by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<ReceiptDocument>> {
        let mut conn = self.pool.acquire().await?;
        let header = Self::find(&mut *conn, id).await?;
        Self::load(&mut conn, header).await
    }

    /// Header and lines by document number.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<ReceiptDocument>> {
        let mut conn = self.pool.acquire().await?;
        let header = Self::find_by_number(&mut *conn, number).await?;
        Self::load(&mut conn, header).await
    }

    /// Headers of a warehouse, newest number first.
    pub async fn list(&self, warehouse_id: &str, limit: u32) -> DbResult<Vec<Receipt>> {
        let sql = format!(
            "SELECT {RECEIPT_COLUMNS} FROM goods_receipts WHERE warehouse_id = ?1 \
             ORDER BY doc_date DESC, number DESC LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, Receipt>(&sql)
            .bind(warehouse_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
