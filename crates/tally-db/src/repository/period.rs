//! # Period Repository
//!
//! Accounting periods, one per (warehouse, `YYYY-MM`).
//!
//! ## Lazy Creation
//! ```text
//! ensure(warehouse, code)
//!      │
//!      ▼
//! INSERT … ON CONFLICT (warehouse_id, period_code) DO NOTHING
//!      │        (a concurrent creator simply wins; nothing fails)
//!      ▼
//! SELECT … WHERE warehouse_id = ? AND period_code = ?
//! ```
//!
//! ## Closing
//! `UPDATE … SET is_closed = 1 WHERE id = ? AND is_closed = 0`; a zero row
//! count means someone else closed it first.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{Period, PeriodCode};

const PERIOD_COLUMNS: &str = "id, warehouse_id, period_code, starts_at, ends_at, \
     is_closed, closed_at, closed_by, created_at";

/// Repository for accounting periods.
#[derive(Debug, Clone)]
pub struct PeriodRepository {
    pool: SqlitePool,
}

impl PeriodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PeriodRepository { pool }
    }

    /// Loads or creates the period for `(warehouse_id, code)`.
    pub async fn ensure(
        conn: &mut SqliteConnection,
        warehouse_id: &str,
        code: PeriodCode,
    ) -> DbResult<Period> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO stock_periods
                (id, warehouse_id, period_code, starts_at, ends_at, is_closed, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            ON CONFLICT (warehouse_id, period_code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(warehouse_id)
        .bind(code.to_string())
        .bind(code.starts_at())
        .bind(code.ends_at())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted > 0 {
            debug!(warehouse_id = %warehouse_id, period_code = %code, "Period opened");
        }

        Self::find(&mut *conn, warehouse_id, code)
            .await?
            .ok_or_else(|| DbError::not_found("Period", format!("{warehouse_id}/{code}")))
    }

    pub async fn find<'e, E: SqliteExecutor<'e>>(
        exec: E,
        warehouse_id: &str,
        code: PeriodCode,
    ) -> DbResult<Option<Period>> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM stock_periods WHERE warehouse_id = ?1 AND period_code = ?2"
        );
        let row = sqlx::query_as::<_, Period>(&sql)
            .bind(warehouse_id)
            .bind(code.to_string())
            .fetch_optional(exec)
            .await?;

        Ok(row)
    }

    /// Marks an open period closed. Returns `false` if it was already closed.
    pub async fn mark_closed<'e, E: SqliteExecutor<'e>>(
        exec: E,
        period_id: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE stock_periods
            SET is_closed = 1, closed_at = ?1, closed_by = ?2
            WHERE id = ?3 AND is_closed = 0
            "#,
        )
        .bind(at)
        .bind(actor)
        .bind(period_id)
        .execute(exec)
        .await?
        .rows_affected();

        Ok(affected == 1)
    }

    pub async fn get(&self, warehouse_id: &str, code: PeriodCode) -> DbResult<Option<Period>> {
        Self::find(&self.pool, warehouse_id, code).await
    }

    /// All periods of a warehouse, oldest first.
    pub async fn list(&self, warehouse_id: &str) -> DbResult<Vec<Period>> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM stock_periods WHERE warehouse_id = ?1 ORDER BY period_code"
        );
        let rows = sqlx::query_as::<_, Period>(&sql)
            .bind(warehouse_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
