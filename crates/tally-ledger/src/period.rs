//! # Period Manager
//!
//! Calendar-month accounting periods per warehouse.
//!
//! ## Period Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   (absent) ──first posting──► open ──close_period()──► closed          │
//! │                                                          │              │
//! │                               successor month ◄──────────┘              │
//! │                               opened, balances carried                  │
//! │                                                                         │
//! │   Closed periods are never reopened and reject every posting.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Carry-Forward
//! For every balance row of the closing period:
//! - closing ≠ 0 and no row in the successor → new row, opening = closing
//! - closing = 0 and no row in the successor → nothing (the ledger stays sparse)
//! - row already in the successor (posted to before the close) → its opening
//!   is rebased on the final closing and its closing recomputed

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::error::LedgerResult;
use crate::stock::balance_overflow;
use tally_core::{CoreError, Period, PeriodCode, ValidationError};
use tally_db::{BalanceRepository, PeriodRepository};

/// Loads or opens the period containing `date`.
pub async fn ensure_period(
    conn: &mut SqliteConnection,
    warehouse_id: &str,
    date: NaiveDate,
) -> LedgerResult<Period> {
    Ok(PeriodRepository::ensure(conn, warehouse_id, PeriodCode::from_date(date)).await?)
}

/// Closes `code` for a warehouse and rolls balances into the next month.
///
/// Returns the successor period.
pub async fn close_period(
    conn: &mut SqliteConnection,
    warehouse_id: &str,
    code: PeriodCode,
    actor: &str,
) -> LedgerResult<Period> {
    let label = format!("Period {code} of warehouse {warehouse_id}");

    let period = PeriodRepository::find(&mut *conn, warehouse_id, code)
        .await?
        .ok_or_else(|| CoreError::not_found("Period", format!("{code} of warehouse {warehouse_id}")))?;

    if period.is_closed {
        return Err(CoreError::invalid_state(label, "closed", "close").into());
    }

    let next_code = code.next().ok_or_else(|| ValidationError::OutOfRange {
        field: "period_code".to_string(),
        min: 1000,
        max: 9999,
    })?;

    // Carrying into a closed month would mutate it
    if let Some(next) = PeriodRepository::find(&mut *conn, warehouse_id, next_code).await? {
        if next.is_closed {
            return Err(CoreError::PeriodClosed {
                warehouse_id: warehouse_id.to_string(),
                period_code: next.period_code,
            }
            .into());
        }
    }

    if !PeriodRepository::mark_closed(&mut *conn, &period.id, actor, Utc::now()).await? {
        return Err(CoreError::invalid_state(label, "closed", "close").into());
    }

    let successor = PeriodRepository::ensure(&mut *conn, warehouse_id, next_code).await?;
    let balances = BalanceRepository::list_for_period(&mut *conn, &period.id).await?;

    let mut carried = 0usize;
    let mut rebased = 0usize;
    for balance in &balances {
        let closing = balance.closing();
        let existing =
            BalanceRepository::find(&mut *conn, &successor.id, &balance.product_id, warehouse_id).await?;

        match existing {
            Some(row) => {
                let mut figures = row.figures();
                if figures.opening != closing {
                    figures.opening = closing;
                    figures.closing = figures
                        .expected_closing()
                        .ok_or_else(|| balance_overflow(&balance.product_id, warehouse_id))?;
                    BalanceRepository::update_figures(&mut *conn, &row, &figures).await?;
                    rebased += 1;
                }
            }
            None => {
                if let Some(figures) = balance.figures().carry_forward() {
                    BalanceRepository::insert(&mut *conn, &successor, &balance.product_id, warehouse_id, &figures)
                        .await?;
                    carried += 1;
                } else {
                    debug!(product_id = %balance.product_id, "Zero balance not carried forward");
                }
            }
        }
    }

    info!(
        warehouse_id = %warehouse_id,
        period_code = %code,
        next_period = %next_code,
        closed_by = %actor,
        rows = balances.len(),
        carried,
        rebased,
        "Period closed"
    );

    Ok(successor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::stock;
    use tally_core::{Money, PostingKind, Quantity};
    use tally_db::{Database, DbConfig};

    async fn setup() -> (Database, String, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let wh = catalog.create_warehouse("MAIN", "Main").await.unwrap();
        let p1 = catalog
            .create_product("P-1", "Flour", "kg", None, Money::from_cents(100))
            .await
            .unwrap();
        let p2 = catalog
            .create_product("P-2", "Sugar", "kg", None, Money::from_cents(100))
            .await
            .unwrap();
        (db, wh.id, p1.id, p2.id)
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    #[tokio::test]
    async fn test_close_carries_non_zero_rows_only() {
        let (db, wh, p1, p2) = setup().await;
        let mut tx = db.begin_write().await.unwrap();

        stock::post(tx.conn(), &p1, &wh, PostingKind::In, Quantity::from_whole(10), jan(3)).await.unwrap();
        stock::post(tx.conn(), &p1, &wh, PostingKind::Sold, Quantity::from_whole(4), jan(9)).await.unwrap();
        stock::post(tx.conn(), &p2, &wh, PostingKind::In, Quantity::from_whole(2), jan(3)).await.unwrap();
        stock::post(tx.conn(), &p2, &wh, PostingKind::Out, Quantity::from_whole(2), jan(4)).await.unwrap();

        let jan_code = PeriodCode::new(2025, 1).unwrap();
        let next = close_period(tx.conn(), &wh, jan_code, "manager").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(next.period_code, "2025-02");
        assert!(!next.is_closed);

        let feb = db.balances().for_period(&wh, PeriodCode::new(2025, 2).unwrap()).await.unwrap();
        assert_eq!(feb.len(), 1);
        assert_eq!(feb[0].product_id, p1);
        assert_eq!(feb[0].figures().opening, Quantity::from_whole(6));
        assert_eq!(feb[0].closing(), Quantity::from_whole(6));

        let closed = db.periods().get(&wh, jan_code).await.unwrap().unwrap();
        assert!(closed.is_closed);
        assert_eq!(closed.closed_by.as_deref(), Some("manager"));
    }

    #[tokio::test]
    async fn test_close_twice_and_unknown_period() {
        let (db, wh, p1, _) = setup().await;
        let mut tx = db.begin_write().await.unwrap();
        stock::post(tx.conn(), &p1, &wh, PostingKind::In, Quantity::from_whole(1), jan(1)).await.unwrap();

        let code = PeriodCode::new(2025, 1).unwrap();
        close_period(tx.conn(), &wh, code, "a").await.unwrap();

        let err = close_period(tx.conn(), &wh, code, "b").await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidStateTransition { .. })));

        let err = close_period(tx.conn(), &wh, PeriodCode::new(2024, 6).unwrap(), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_existing_successor_row_is_rebased() {
        let (db, wh, p1, _) = setup().await;
        let mut tx = db.begin_write().await.unwrap();
        let feb = NaiveDate::from_ymd_opt(2025, 2, 2).unwrap();

        stock::post(tx.conn(), &p1, &wh, PostingKind::In, Quantity::from_whole(5), jan(2)).await.unwrap();
        // February row seeded with opening 5
        stock::post(tx.conn(), &p1, &wh, PostingKind::Sold, Quantity::from_whole(1), feb).await.unwrap();
        // Late January receipt moves January's closing to 8
        stock::post(tx.conn(), &p1, &wh, PostingKind::In, Quantity::from_whole(3), jan(30)).await.unwrap();

        close_period(tx.conn(), &wh, PeriodCode::new(2025, 1).unwrap(), "m").await.unwrap();
        tx.commit().await.unwrap();

        let rows = db.balances().for_period(&wh, PeriodCode::new(2025, 2).unwrap()).await.unwrap();
        let figures = rows[0].figures();
        assert_eq!(figures.opening, Quantity::from_whole(8));
        assert_eq!(figures.sold, Quantity::from_whole(1));
        assert_eq!(figures.closing, Quantity::from_whole(7));
        assert!(figures.is_consistent());
    }
}
