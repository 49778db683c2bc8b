//! # Stock Ledger
//!
//! The one posting primitive every workflow goes through, plus the
//! availability check that guards outbound postings.
//!
//! ## Posting
//! ```text
//! post(product, warehouse, kind, qty, date)
//!   │
//!   ├─ 1. period = ensure_period(warehouse, date); closed → PeriodClosed
//!   ├─ 2. row for (period, product, warehouse)?
//!   │       no → opening = closing of the nearest earlier row (0 if none)
//!   ├─ 3. in / out / sold += qty      (never decremented)
//!   ├─ 4. closing = opening + in − out − sold
//!   └─ 5. versioned write (lost update → Conflict)
//! ```
//!
//! Direction lives in `kind`; a reversal posts the opposite kind with the
//! same quantity.

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::LedgerResult;
use crate::period::ensure_period;
use tally_core::{Balance, BalanceFigures, CoreError, PostingKind, Quantity, ValidationError};
use tally_db::BalanceRepository;

/// Overflow error naming the `(product, warehouse)` pair.
pub(crate) fn balance_overflow(product_id: &str, warehouse_id: &str) -> ValidationError {
    ValidationError::overflow(format!("balance of product {product_id} at warehouse {warehouse_id}"))
}

/// Re-labels an arithmetic overflow with the pair it happened on.
fn on_pair(err: ValidationError, product_id: &str, warehouse_id: &str) -> ValidationError {
    match err {
        ValidationError::Overflow { .. } => balance_overflow(product_id, warehouse_id),
        other => other,
    }
}

/// Applies one posting to the balance of `(product, warehouse)` in the
/// period containing `date`.
pub async fn post(
    conn: &mut SqliteConnection,
    product_id: &str,
    warehouse_id: &str,
    kind: PostingKind,
    quantity: Quantity,
    date: NaiveDate,
) -> LedgerResult<Balance> {
    let period = ensure_period(&mut *conn, warehouse_id, date).await?;
    if period.is_closed {
        return Err(CoreError::PeriodClosed {
            warehouse_id: warehouse_id.to_string(),
            period_code: period.period_code,
        }
        .into());
    }

    let current = BalanceRepository::find(&mut *conn, &period.id, product_id, warehouse_id).await?;

    let balance = match current {
        Some(row) => {
            let mut figures = row.figures();
            figures
                .post(kind, quantity)
                .map_err(|e| on_pair(e, product_id, warehouse_id))?;
            BalanceRepository::update_figures(&mut *conn, &row, &figures).await?
        }
        None => {
            let opening = BalanceRepository::nearest_before(&mut *conn, product_id, warehouse_id, period.code()?)
                .await?
                .map(|earlier| earlier.closing())
                .unwrap_or_default();

            let mut figures = BalanceFigures::opening(opening);
            figures
                .post(kind, quantity)
                .map_err(|e| on_pair(e, product_id, warehouse_id))?;
            BalanceRepository::insert(&mut *conn, &period, product_id, warehouse_id, &figures).await?
        }
    };

    debug!(
        product_id = %product_id,
        warehouse_id = %warehouse_id,
        period_code = %balance.period_code,
        kind = %kind,
        quantity = %quantity,
        closing = %balance.closing(),
        "Posted"
    );

    Ok(balance)
}

/// Closing quantity of the latest period for the pair, zero if none.
pub async fn current_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    warehouse_id: &str,
) -> LedgerResult<Quantity> {
    Ok(BalanceRepository::closing_of_latest(conn, product_id, warehouse_id).await?)
}

/// Fails with `InsufficientStock` unless every requested product is covered.
///
/// Quantities of repeated products are summed first, so two lines of 4
/// against a stock of 6 fail. Nothing is written.
pub async fn check_availability<'a>(
    conn: &mut SqliteConnection,
    warehouse_id: &str,
    requests: impl IntoIterator<Item = (&'a str, Quantity)>,
) -> LedgerResult<()> {
    let mut wanted: Vec<(&str, Quantity)> = Vec::new();
    for (product_id, quantity) in requests {
        match wanted.iter_mut().find(|(id, _)| *id == product_id) {
            Some((_, total)) => {
                *total = total
                    .checked_add(quantity)
                    .ok_or_else(|| balance_overflow(product_id, warehouse_id))?;
            }
            None => wanted.push((product_id, quantity)),
        }
    }

    for (product_id, requested) in wanted {
        let available = current_stock(&mut *conn, product_id, warehouse_id).await?;
        if available < requested {
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                warehouse_id: warehouse_id.to_string(),
                available,
                requested,
            }
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::period::close_period;
    use tally_core::{Money, PeriodCode};
    use tally_db::{Database, DbConfig};

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let wh = db.catalog().create_warehouse("MAIN", "Main").await.unwrap();
        let product = db
            .catalog()
            .create_product("P-1", "Milk", "l", None, Money::from_cents(90))
            .await
            .unwrap();
        (db, wh.id, product.id)
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn qty(milli: i64) -> Quantity {
        Quantity::from_milli(milli)
    }

    #[tokio::test]
    async fn test_in_then_out_nets_to_zero() {
        let (db, wh, p) = setup().await;
        let mut tx = db.begin_write().await.unwrap();

        post(tx.conn(), &p, &wh, PostingKind::In, qty(2_500), day(1, 5)).await.unwrap();
        let row = post(tx.conn(), &p, &wh, PostingKind::Out, qty(2_500), day(1, 5)).await.unwrap();

        let figures = row.figures();
        assert_eq!(figures.inbound, qty(2_500));
        assert_eq!(figures.outbound, qty(2_500));
        assert!(figures.closing.is_zero());
        assert_eq!(row.version, 2);
        assert!(current_stock(tx.conn(), &p, &wh).await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_opening_seeded_from_nearest_earlier_period() {
        let (db, wh, p) = setup().await;
        let mut tx = db.begin_write().await.unwrap();

        post(tx.conn(), &p, &wh, PostingKind::In, qty(7_000), day(1, 10)).await.unwrap();
        // March skips February entirely
        let march = post(tx.conn(), &p, &wh, PostingKind::Sold, qty(1_000), day(3, 2)).await.unwrap();

        assert_eq!(march.period_code, "2025-03");
        assert_eq!(march.figures().opening, qty(7_000));
        assert_eq!(march.closing(), qty(6_000));
        assert_eq!(current_stock(tx.conn(), &p, &wh).await.unwrap(), qty(6_000));
    }

    #[tokio::test]
    async fn test_closed_period_rejects_and_leaves_balance() {
        let (db, wh, p) = setup().await;
        let mut tx = db.begin_write().await.unwrap();

        post(tx.conn(), &p, &wh, PostingKind::In, qty(3_000), day(1, 10)).await.unwrap();
        close_period(tx.conn(), &wh, PeriodCode::new(2025, 1).unwrap(), "m").await.unwrap();

        let err = post(tx.conn(), &p, &wh, PostingKind::Out, qty(1_000), day(1, 20))
            .await
            .unwrap_err();
        match err {
            LedgerError::Core(CoreError::PeriodClosed { period_code, .. }) => {
                assert_eq!(period_code, "2025-01")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(current_stock(tx.conn(), &p, &wh).await.unwrap(), qty(3_000));
    }

    #[tokio::test]
    async fn test_negative_quantity_rejected() {
        let (db, wh, p) = setup().await;
        let mut tx = db.begin_write().await.unwrap();
        let err = post(tx.conn(), &p, &wh, PostingKind::In, qty(-1), day(1, 1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_overflowing_post_names_the_pair() {
        let (db, wh, p) = setup().await;
        let mut tx = db.begin_write().await.unwrap();
        post(tx.conn(), &p, &wh, PostingKind::In, qty(i64::MAX), day(1, 3)).await.unwrap();

        let err = post(tx.conn(), &p, &wh, PostingKind::In, qty(1), day(1, 4)).await.unwrap_err();
        match err {
            LedgerError::Core(CoreError::Validation(ValidationError::Overflow { field })) => {
                assert!(field.contains(&p));
                assert!(field.contains(&wh));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(current_stock(tx.conn(), &p, &wh).await.unwrap(), qty(i64::MAX));
    }

    #[tokio::test]
    async fn test_availability_sums_repeated_products() {
        let (db, wh, p) = setup().await;
        let mut tx = db.begin_write().await.unwrap();
        post(tx.conn(), &p, &wh, PostingKind::In, qty(6_000), day(1, 1)).await.unwrap();

        check_availability(tx.conn(), &wh, [(p.as_str(), qty(6_000))]).await.unwrap();

        let err = check_availability(tx.conn(), &wh, [(p.as_str(), qty(4_000)), (p.as_str(), qty(4_000))])
            .await
            .unwrap_err();
        match err {
            LedgerError::Core(CoreError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, qty(6_000));
                assert_eq!(requested, qty(8_000));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
