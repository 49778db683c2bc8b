//! # Balance Repository
//!
//! Versioned balance rows, one per (period, product, warehouse).
//!
//! ## Optimistic Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  read  → Balance { version: 7, closing: 10 }                            │
//! │  math  → closing: 6                                                     │
//! │  write → UPDATE … SET …, version = 8 WHERE id = ? AND version = 7       │
//! │              │                                                          │
//! │              ├── 1 row  → done                                          │
//! │              └── 0 rows → DbError::Conflict (someone wrote in between)  │
//! │                                                                         │
//! │  Lazy insert racing another insert → UNIQUE violation → Conflict too.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lookups
//! `(product_id, warehouse_id, period_code)` is indexed, so "latest row" and
//! "nearest earlier row" are single index seeks.

use chrono::Utc;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{Balance, BalanceFigures, Period, PeriodCode, Quantity};

const BALANCE_COLUMNS: &str = "id, period_id, period_code, product_id, warehouse_id, \
     opening_milli, in_milli, out_milli, sold_milli, closing_milli, version, updated_at";

/// Repository for balance rows.
#[derive(Debug, Clone)]
pub struct BalanceRepository {
    pool: SqlitePool,
}

impl BalanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BalanceRepository { pool }
    }

    // =========================================================================
    // Executor-level operations
    // =========================================================================

    pub async fn find<'e, E: SqliteExecutor<'e>>(
        exec: E,
        period_id: &str,
        product_id: &str,
        warehouse_id: &str,
    ) -> DbResult<Option<Balance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances \
             WHERE period_id = ?1 AND product_id = ?2 AND warehouse_id = ?3"
        );
        let row = sqlx::query_as::<_, Balance>(&sql)
            .bind(period_id)
            .bind(product_id)
            .bind(warehouse_id)
            .fetch_optional(exec)
            .await?;

        Ok(row)
    }

    /// The row with the highest period code strictly below `before`.
    ///
    /// Not necessarily the previous calendar month: gaps are skipped.
    pub async fn nearest_before<'e, E: SqliteExecutor<'e>>(
        exec: E,
        product_id: &str,
        warehouse_id: &str,
        before: PeriodCode,
    ) -> DbResult<Option<Balance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances \
             WHERE product_id = ?1 AND warehouse_id = ?2 AND period_code < ?3 \
             ORDER BY period_code DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, Balance>(&sql)
            .bind(product_id)
            .bind(warehouse_id)
            .bind(before.to_string())
            .fetch_optional(exec)
            .await?;

        Ok(row)
    }

    /// The row with the highest period code for the pair.
    pub async fn latest<'e, E: SqliteExecutor<'e>>(
        exec: E,
        product_id: &str,
        warehouse_id: &str,
    ) -> DbResult<Option<Balance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances \
             WHERE product_id = ?1 AND warehouse_id = ?2 \
             ORDER BY period_code DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, Balance>(&sql)
            .bind(product_id)
            .bind(warehouse_id)
            .fetch_optional(exec)
            .await?;

        Ok(row)
    }

    /// Closing quantity of the latest row, zero if the pair has none.
    pub async fn closing_of_latest<'e, E: SqliteExecutor<'e>>(
        exec: E,
        product_id: &str,
        warehouse_id: &str,
    ) -> DbResult<Quantity> {
        Ok(Self::latest(exec, product_id, warehouse_id)
            .await?
            .map(|b| b.closing())
            .unwrap_or_default())
    }

    /// Inserts a fresh row for `period`.
    pub async fn insert<'e, E: SqliteExecutor<'e>>(
        exec: E,
        period: &Period,
        product_id: &str,
        warehouse_id: &str,
        figures: &BalanceFigures,
    ) -> DbResult<Balance> {
        let balance = Balance {
            id: Uuid::new_v4().to_string(),
            period_id: period.id.clone(),
            period_code: period.period_code.clone(),
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            opening_milli: figures.opening.milli(),
            in_milli: figures.inbound.milli(),
            out_milli: figures.outbound.milli(),
            sold_milli: figures.sold.milli(),
            closing_milli: figures.closing.milli(),
            version: 1,
            updated_at: Utc::now(),
        };

        debug!(
            period_code = %balance.period_code,
            product_id = %product_id,
            warehouse_id = %warehouse_id,
            opening = %figures.opening,
            "Creating balance row"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_balances (
                id, period_id, period_code, product_id, warehouse_id,
                opening_milli, in_milli, out_milli, sold_milli, closing_milli,
                version, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&balance.id)
        .bind(&balance.period_id)
        .bind(&balance.period_code)
        .bind(&balance.product_id)
        .bind(&balance.warehouse_id)
        .bind(balance.opening_milli)
        .bind(balance.in_milli)
        .bind(balance.out_milli)
        .bind(balance.sold_milli)
        .bind(balance.closing_milli)
        .bind(balance.version)
        .bind(balance.updated_at)
        .execute(exec)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::conflict(
                "balance",
                format!(
                    "row for product {product_id} at warehouse {warehouse_id} in {} created concurrently",
                    period.period_code
                ),
            ),
            other => other,
        })?;

        Ok(balance)
    }

    /// Writes new figures if nobody changed the row since it was read.
    pub async fn update_figures<'e, E: SqliteExecutor<'e>>(
        exec: E,
        current: &Balance,
        figures: &BalanceFigures,
    ) -> DbResult<Balance> {
        let updated_at = Utc::now();

        let affected = sqlx::query(
            r#"
            UPDATE stock_balances
            SET opening_milli = ?1, in_milli = ?2, out_milli = ?3, sold_milli = ?4,
                closing_milli = ?5, version = version + 1, updated_at = ?6
            WHERE id = ?7 AND version = ?8
            "#,
        )
        .bind(figures.opening.milli())
        .bind(figures.inbound.milli())
        .bind(figures.outbound.milli())
        .bind(figures.sold.milli())
        .bind(figures.closing.milli())
        .bind(updated_at)
        .bind(&current.id)
        .bind(current.version)
        .execute(exec)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(DbError::conflict(
                "balance",
                format!(
                    "product {} at warehouse {} in {} changed since version {}",
                    current.product_id, current.warehouse_id, current.period_code, current.version
                ),
            ));
        }

        Ok(Balance {
            opening_milli: figures.opening.milli(),
            in_milli: figures.inbound.milli(),
            out_milli: figures.outbound.milli(),
            sold_milli: figures.sold.milli(),
            closing_milli: figures.closing.milli(),
            version: current.version + 1,
            updated_at,
            ..current.clone()
        })
    }

    /// Every row of one period.
    pub async fn list_for_period(conn: &mut SqliteConnection, period_id: &str) -> DbResult<Vec<Balance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances WHERE period_id = ?1 ORDER BY product_id"
        );
        let rows = sqlx::query_as::<_, Balance>(&sql)
            .bind(period_id)
            .fetch_all(conn)
            .await?;

        Ok(rows)
    }

    // =========================================================================
    // Pool-level reads
    // =========================================================================

    /// Closing quantity of the latest period for the pair (zero if none).
    pub async fn current_stock(&self, product_id: &str, warehouse_id: &str) -> DbResult<Quantity> {
        Self::closing_of_latest(&self.pool, product_id, warehouse_id).await
    }

    /// Rows of one warehouse in one period.
    pub async fn for_period(&self, warehouse_id: &str, code: PeriodCode) -> DbResult<Vec<Balance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances \
             WHERE warehouse_id = ?1 AND period_code = ?2 ORDER BY product_id"
        );
        let rows = sqlx::query_as::<_, Balance>(&sql)
            .bind(warehouse_id)
            .bind(code.to_string())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Each product's latest row in a warehouse.
    pub async fn latest_for_warehouse(&self, warehouse_id: &str) -> DbResult<Vec<Balance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances b \
             WHERE b.warehouse_id = ?1 AND b.period_code = ( \
                 SELECT MAX(l.period_code) FROM stock_balances l \
                 WHERE l.product_id = b.product_id AND l.warehouse_id = b.warehouse_id) \
             ORDER BY b.product_id"
        );
        let rows = sqlx::query_as::<_, Balance>(&sql)
            .bind(warehouse_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::period::PeriodRepository;
    use crate::repository::test_support::seeded;
    use tally_core::PostingKind;

    fn code(s: &str) -> PeriodCode {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_update_bumps_version() {
        let (db, wh, product) = seeded().await;
        let mut tx = db.begin_write().await.unwrap();

        let period = PeriodRepository::ensure(tx.conn(), &wh.id, code("2025-01")).await.unwrap();
        let row = BalanceRepository::insert(
            tx.conn(),
            &period,
            &product.id,
            &wh.id,
            &BalanceFigures::opening(Quantity::zero()),
        )
        .await
        .unwrap();
        assert_eq!(row.version, 1);

        let mut figures = row.figures();
        figures.post(PostingKind::In, Quantity::from_whole(10)).unwrap();
        let row = BalanceRepository::update_figures(tx.conn(), &row, &figures).await.unwrap();
        assert_eq!(row.version, 2);
        tx.commit().await.unwrap();

        assert_eq!(
            db.balances().current_stock(&product.id, &wh.id).await.unwrap(),
            Quantity::from_whole(10)
        );
    }

    #[tokio::test]
    async fn test_stale_version_is_conflict() {
        let (db, wh, product) = seeded().await;
        let mut tx = db.begin_write().await.unwrap();

        let period = PeriodRepository::ensure(tx.conn(), &wh.id, code("2025-01")).await.unwrap();
        let stale = BalanceRepository::insert(
            tx.conn(),
            &period,
            &product.id,
            &wh.id,
            &BalanceFigures::opening(Quantity::zero()),
        )
        .await
        .unwrap();

        let mut figures = stale.figures();
        figures.post(PostingKind::In, Quantity::from_whole(1)).unwrap();
        BalanceRepository::update_figures(tx.conn(), &stale, &figures).await.unwrap();

        let err = BalanceRepository::update_figures(tx.conn(), &stale, &figures)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, DbError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let (db, wh, product) = seeded().await;
        let mut tx = db.begin_write().await.unwrap();

        let period = PeriodRepository::ensure(tx.conn(), &wh.id, code("2025-01")).await.unwrap();
        let zero = BalanceFigures::opening(Quantity::zero());
        BalanceRepository::insert(tx.conn(), &period, &product.id, &wh.id, &zero).await.unwrap();
        let err = BalanceRepository::insert(tx.conn(), &period, &product.id, &wh.id, &zero)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_database_rejects_inconsistent_row() {
        let (db, wh, product) = seeded().await;
        let mut tx = db.begin_write().await.unwrap();

        let period = PeriodRepository::ensure(tx.conn(), &wh.id, code("2025-01")).await.unwrap();
        let broken = BalanceFigures {
            opening: Quantity::from_whole(1),
            closing: Quantity::from_whole(5),
            ..Default::default()
        };
        let err = BalanceRepository::insert(tx.conn(), &period, &product.id, &wh.id, &broken).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_nearest_before_skips_gaps() {
        let (db, wh, product) = seeded().await;
        let mut tx = db.begin_write().await.unwrap();

        for (c, qty) in [("2024-10", 3), ("2025-01", 7)] {
            let period = PeriodRepository::ensure(tx.conn(), &wh.id, code(c)).await.unwrap();
            BalanceRepository::insert(
                tx.conn(),
                &period,
                &product.id,
                &wh.id,
                &BalanceFigures::opening(Quantity::from_whole(qty)),
            )
            .await
            .unwrap();
        }

        let before_march = BalanceRepository::nearest_before(tx.conn(), &product.id, &wh.id, code("2025-03"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before_march.period_code, "2025-01");

        let before_jan = BalanceRepository::nearest_before(tx.conn(), &product.id, &wh.id, code("2025-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before_jan.period_code, "2024-10");

        assert!(BalanceRepository::nearest_before(tx.conn(), &product.id, &wh.id, code("2024-10"))
            .await
            .unwrap()
            .is_none());
        tx.commit().await.unwrap();

        let latest = db.balances().latest_for_warehouse(&wh.id).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].closing(), Quantity::from_whole(7));
        assert_eq!(db.balances().for_period(&wh.id, code("2024-10")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_current_stock_defaults_to_zero() {
        let (db, wh, product) = seeded().await;
        assert!(db.balances().current_stock(&product.id, &wh.id).await.unwrap().is_zero());
    }
}
