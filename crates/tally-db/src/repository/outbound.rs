//! # Outbound Repository
//!
//! Outbound movements (returns, transfers, adjustments) and their lines.
//!
//! Same lifecycle and guarded transitions as receipts; the kind-specific
//! references (destination warehouse, supplier) are also enforced by table
//! CHECK constraints.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::lines::{insert_lines, select_lines, OUTBOUND_LINES};
use tally_core::{DocumentLine, DocumentStatus, OutboundDocument, OutboundMovement};

const OUTBOUND_COLUMNS: &str = "id, number, doc_date, kind, warehouse_id, destination_warehouse_id, \
     supplier_id, reason, notes, status, \
     total_amount_cents, total_discount_cents, total_tax_cents, grand_total_cents, \
     created_by, created_at, confirmed_at, confirmed_by, cancelled_at, cancelled_by";

/// Repository for outbound movements.
#[derive(Debug, Clone)]
pub struct OutboundRepository {
    pool: SqlitePool,
}

impl OutboundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OutboundRepository { pool }
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        movement: &OutboundMovement,
        lines: &[DocumentLine],
    ) -> DbResult<()> {
        debug!(
            id = %movement.id,
            number = %movement.number,
            kind = %movement.kind,
            lines = lines.len(),
            "Inserting outbound movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_outs (
                id, number, doc_date, kind, warehouse_id, destination_warehouse_id,
                supplier_id, reason, notes, status,
                total_amount_cents, total_discount_cents, total_tax_cents, grand_total_cents,
                created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.number)
        .bind(movement.doc_date)
        .bind(movement.kind)
        .bind(&movement.warehouse_id)
        .bind(&movement.destination_warehouse_id)
        .bind(&movement.supplier_id)
        .bind(&movement.reason)
        .bind(&movement.notes)
        .bind(movement.status)
        .bind(movement.total_amount_cents)
        .bind(movement.total_discount_cents)
        .bind(movement.total_tax_cents)
        .bind(movement.grand_total_cents)
        .bind(&movement.created_by)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        insert_lines(conn, OUTBOUND_LINES, lines).await
    }

    pub async fn find<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<Option<OutboundMovement>> {
        let sql = format!("SELECT {OUTBOUND_COLUMNS} FROM stock_outs WHERE id = ?1");
        let row = sqlx::query_as::<_, OutboundMovement>(&sql)
            .bind(id)
            .fetch_optional(exec)
            .await?;
        Ok(row)
    }

    pub async fn find_by_number<'e, E: SqliteExecutor<'e>>(
        exec: E,
        number: &str,
    ) -> DbResult<Option<OutboundMovement>> {
        let sql = format!("SELECT {OUTBOUND_COLUMNS} FROM stock_outs WHERE number = ?1");
        let row = sqlx::query_as::<_, OutboundMovement>(&sql)
            .bind(number)
            .fetch_optional(exec)
            .await?;
        Ok(row)
    }

    pub async fn lines<'e, E: SqliteExecutor<'e>>(exec: E, outbound_id: &str) -> DbResult<Vec<DocumentLine>> {
        select_lines(exec, OUTBOUND_LINES, outbound_id).await
    }

    /// Moves `from` → `to`. Returns `false` if the movement was not in `from`.
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
                "UPDATE stock_outs SET status = ?1, confirmed_at = ?2, confirmed_by = ?3 \
                 WHERE id = ?4 AND status = ?5"
            }
            DocumentStatus::Cancelled => {
                "UPDATE stock_outs SET status = ?1, cancelled_at = ?2, cancelled_by = ?3 \
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

    async fn load(
        conn: &mut SqliteConnection,
        header: Option<OutboundMovement>,
    ) -> DbResult<Option<OutboundDocument>> {
        let Some(header) = header else {
            return Ok(None);
        };
        let lines = Self::lines(&mut *conn, &header.id).await?;
        Ok(Some(OutboundDocument { header, lines }))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<OutboundDocument>> {
        let mut conn = self.pool.acquire().await?;
        let header = Self::find(&mut *conn, id).await?;
        Self::load(&mut conn, header).await
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<OutboundDocument>> {
        let mut conn = self.pool.acquire().await?;
        let header = Self::find_by_number(&mut *conn, number).await?;
        Self::load(&mut conn, header).await
    }

    /// Movements leaving a warehouse, newest first.
    pub async fn list(&self, warehouse_id: &str, limit: u32) -> DbResult<Vec<OutboundMovement>> {
        let sql = format!(
            "SELECT {OUTBOUND_COLUMNS} FROM stock_outs WHERE warehouse_id = ?1 \
             ORDER BY doc_date DESC, number DESC LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, OutboundMovement>(&sql)
            .bind(warehouse_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
