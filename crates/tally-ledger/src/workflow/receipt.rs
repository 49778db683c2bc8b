//! Goods receipt workflow: stock arriving from a supplier.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{post_lines, price_lines, require_products, require_warehouse};
use crate::error::LedgerResult;
use crate::sequence::next_number;
use tally_core::validation::{validate_lines, validate_required};
use tally_core::{CoreError, DocumentStatus, DocumentType, NewReceipt, PostingKind, Receipt, ReceiptDocument};
use tally_db::ReceiptRepository;

/// Creates a draft receipt. No ledger effect.
pub async fn create(conn: &mut SqliteConnection, input: &NewReceipt) -> LedgerResult<ReceiptDocument> {
    validate_required("warehouse_id", &input.warehouse_id)?;
    validate_required("created_by", &input.created_by)?;
    validate_lines(input.lines.iter())?;

    require_warehouse(&mut *conn, &input.warehouse_id).await?;
    require_products(&mut *conn, input.lines.iter().map(|l| l.product_id.as_str())).await?;

    let number = next_number(&mut *conn, DocumentType::Receipt, input.doc_date).await?;
    let id = Uuid::new_v4().to_string();
    let (lines, totals) = price_lines(&id, &input.lines)?;

    let header = Receipt {
        id,
        number: number.to_string(),
        doc_date: input.doc_date,
        warehouse_id: input.warehouse_id.clone(),
        supplier_id: input.supplier_id.clone(),
        notes: input.notes.clone(),
        status: DocumentStatus::Draft,
        total_amount_cents: totals.total_amount.cents(),
        total_discount_cents: totals.total_discount.cents(),
        total_tax_cents: totals.total_tax.cents(),
        grand_total_cents: totals.grand_total.cents(),
        created_by: input.created_by.clone(),
        created_at: Utc::now(),
        confirmed_at: None,
        confirmed_by: None,
        cancelled_at: None,
        cancelled_by: None,
    };

    ReceiptRepository::insert(&mut *conn, &header, &lines).await?;

    info!(number = %header.number, lines = lines.len(), grand_total = %totals.grand_total, "Receipt created");
    Ok(ReceiptDocument { header, lines })
}

/// draft → confirmed, posting IN for every line.
pub async fn confirm(conn: &mut SqliteConnection, id: &str, actor: &str) -> LedgerResult<ReceiptDocument> {
    let header = load(&mut *conn, id).await?;
    if header.status != DocumentStatus::Draft {
        return Err(CoreError::invalid_state(label(&header), header.status, "confirm").into());
    }

    transition(&mut *conn, &header, DocumentStatus::Draft, DocumentStatus::Confirmed, actor).await?;

    let lines = ReceiptRepository::lines(&mut *conn, id).await?;
    post_lines(&mut *conn, &lines, &header.warehouse_id, PostingKind::In, header.doc_date).await?;

    info!(number = %header.number, confirmed_by = %actor, "Receipt confirmed");
    reload(conn, id, lines).await
}

/// Cancels a receipt, reversing its postings if it was confirmed.
pub async fn cancel(conn: &mut SqliteConnection, id: &str, actor: &str) -> LedgerResult<ReceiptDocument> {
    let header = load(&mut *conn, id).await?;
    let lines = ReceiptRepository::lines(&mut *conn, id).await?;

    match header.status {
        DocumentStatus::Draft => {
            transition(&mut *conn, &header, DocumentStatus::Draft, DocumentStatus::Cancelled, actor).await?;
        }
        DocumentStatus::Confirmed => {
            transition(&mut *conn, &header, DocumentStatus::Confirmed, DocumentStatus::Cancelled, actor).await?;
            post_lines(
                &mut *conn,
                &lines,
                &header.warehouse_id,
                PostingKind::In.opposite(),
                header.doc_date,
            )
            .await?;
        }
        DocumentStatus::Cancelled => {
            return Err(CoreError::invalid_state(label(&header), header.status, "cancel").into());
        }
    }

    info!(number = %header.number, was = %header.status, cancelled_by = %actor, "Receipt cancelled");
    reload(conn, id, lines).await
}

fn label(header: &Receipt) -> String {
    format!("Receipt {}", header.number)
}

async fn load(conn: &mut SqliteConnection, id: &str) -> LedgerResult<Receipt> {
    ReceiptRepository::find(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Receipt", id).into())
}

async fn transition(
    conn: &mut SqliteConnection,
    header: &Receipt,
    from: DocumentStatus,
    to: DocumentStatus,
    actor: &str,
) -> LedgerResult<()> {
    if !ReceiptRepository::transition(conn, &header.id, from, to, actor, Utc::now()).await? {
        let operation = if to == DocumentStatus::Confirmed { "confirm" } else { "cancel" };
        return Err(CoreError::invalid_state(label(header), from, operation).into());
    }
    Ok(())
}

async fn reload(
    conn: &mut SqliteConnection,
    id: &str,
    lines: Vec<tally_core::DocumentLine>,
) -> LedgerResult<ReceiptDocument> {
    let header = load(conn, id).await?;
    Ok(ReceiptDocument { header, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::stock::current_stock;
    use chrono::NaiveDate;
    use tally_core::pricing::LineInput;
    use tally_core::{Money, Quantity};
    use tally_db::{Database, DbConfig};

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let wh = db.catalog().create_warehouse("MAIN", "Main").await.unwrap();
        let p = db
            .catalog()
            .create_product("P-1", "Rice", "kg", None, Money::from_cents(200))
            .await
            .unwrap();
        (db, wh.id, p.id)
    }

    fn input(wh: &str, product: &str, whole: i64) -> NewReceipt {
        NewReceipt {
            doc_date: NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
            warehouse_id: wh.to_string(),
            supplier_id: Some("sup-1".to_string()),
            notes: None,
            lines: vec![LineInput::new(product, Quantity::from_whole(whole), Money::from_cents(200))],
            created_by: "clerk".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_is_draft_without_postings() {
        let (db, wh, p) = setup().await;
        let mut tx = db.begin_write().await.unwrap();

        let doc = create(tx.conn(), &input(&wh, &p, 10)).await.unwrap();
        assert_eq!(doc.header.number, "GR/2501/0001");
        assert_eq!(doc.header.status, DocumentStatus::Draft);
        assert_eq!(doc.header.grand_total_cents, 2000);
        assert!(current_stock(tx.conn(), &p, &wh).await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_confirm_twice_fails() {
        let (db, wh, p) = setup().await;
        let mut tx = db.begin_write().await.unwrap();

        let doc = create(tx.conn(), &input(&wh, &p, 10)).await.unwrap();
        let confirmed = confirm(tx.conn(), &doc.header.id, "boss").await.unwrap();
        assert_eq!(confirmed.header.status, DocumentStatus::Confirmed);
        assert_eq!(confirmed.header.confirmed_by.as_deref(), Some("boss"));
        assert_eq!(current_stock(tx.conn(), &p, &wh).await.unwrap(), Quantity::from_whole(10));

        let err = confirm(tx.conn(), &doc.header.id, "boss").await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidStateTransition { .. })));
        assert!(err.to_string().contains("GR/2501/0001"));
    }

    #[tokio::test]
    async fn test_cancel_draft_has_no_ledger_effect() {
        let (db, wh, p) = setup().await;
        let mut tx = db.begin_write().await.unwrap();

        let doc = create(tx.conn(), &input(&wh, &p, 4)).await.unwrap();
        let cancelled = cancel(tx.conn(), &doc.header.id, "boss").await.unwrap();
        assert_eq!(cancelled.header.status, DocumentStatus::Cancelled);
        assert!(db_rows_empty(tx.conn(), &wh).await);

        let err = cancel(tx.conn(), &doc.header.id, "boss").await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let (db, wh, _) = setup().await;
        let mut tx = db.begin_write().await.unwrap();

        let err = confirm(tx.conn(), "missing", "boss").await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::NotFound { .. })));

        let err = create(tx.conn(), &input(&wh, "ghost", 1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::NotFound { ref entity, .. }) if entity == "Product"));
    }

    async fn db_rows_empty(conn: &mut SqliteConnection, wh: &str) -> bool {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_balances WHERE warehouse_id = ?1")
            .bind(wh)
            .fetch_one(conn)
            .await
            .unwrap();
        count == 0
    }
}
