//! # Sales Invoice Workflow
//!
//! A sale is created already completed: priced, paid and posted in one
//! write unit. Direct counter sales and table-order checkouts take the same
//! path; the latter only carry a `TO/YYMM/NNNN` reference.
//!
//! ## Stock-Tracked Lines
//! ```text
//! product ──► category ──► is_preparation?
//!                              │
//!               yes ◄──────────┴──────────► no / no category
//!                │                             │
//!     made to order, never                stock-tracked:
//!     checked nor posted                  checked, SOLD on create,
//!                                         IN on cancel
//! ```
//!
//! The tracked flag is frozen on the invoice line, so recategorising a
//! product later does not change what a cancellation reverses.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{price_lines, require_products, require_warehouse};
use crate::error::LedgerResult;
use crate::sequence::next_number;
use crate::stock::{self, check_availability};
use tally_core::pricing::{compute_change, DocumentTotals, LineInput};
use tally_core::validation::{validate_lines, validate_payment, validate_required};
use tally_core::{
    CoreError, CoreResult, DocumentNumber, DocumentType, InvoiceLine, InvoiceStatus, Money, NewSale,
    PaymentMethod, PostingKind, SaleSettlement, SalesInvoice, SalesInvoiceDocument, ValidationError,
};
use tally_db::InvoiceRepository;

/// Payment figures for a priced sale.
///
/// Cash settles against the amount received; every other method is taken
/// as paid in full with no change.
pub fn settle(method: PaymentMethod, totals: DocumentTotals, received: Option<Money>) -> CoreResult<SaleSettlement> {
    let (amount_received, change) = match method {
        PaymentMethod::Cash => {
            let received = received.ok_or_else(|| CoreError::missing_reference("cash sale", "amount_received"))?;
            (received, compute_change(totals.grand_total, received)?)
        }
        PaymentMethod::Transfer | PaymentMethod::Credit => (totals.grand_total, Money::zero()),
    };

    Ok(SaleSettlement {
        totals,
        amount_received,
        change,
    })
}

/// Creates a completed invoice and posts SOLD for its stock-tracked lines.
pub async fn create_sale(conn: &mut SqliteConnection, input: &NewSale) -> LedgerResult<SalesInvoiceDocument> {
    validate_required("warehouse_id", &input.warehouse_id)?;
    validate_required("created_by", &input.created_by)?;
    validate_payment(input)?;
    validate_lines(input.lines.iter().map(|l| &l.line))?;

    if let Some(reference) = input.table_order_ref.as_deref() {
        let parsed = DocumentNumber::parse(reference)?;
        if parsed.doc_type != DocumentType::TableOrder {
            return Err(ValidationError::invalid_format(
                "table_order_ref",
                format!("expected a {} number", DocumentType::TableOrder.prefix()),
            )
            .into());
        }
    }

    require_warehouse(&mut *conn, &input.warehouse_id).await?;
    let product_ids: Vec<&str> = input.lines.iter().map(|l| l.line.product_id.as_str()).collect();
    let profiles = require_products(&mut *conn, product_ids).await?;
    let tracked: Vec<bool> = profiles.iter().map(|p| p.is_stock_tracked()).collect();

    check_availability(
        &mut *conn,
        &input.warehouse_id,
        input
            .lines
            .iter()
            .zip(&tracked)
            .filter(|(_, tracked)| **tracked)
            .map(|(l, _)| (l.line.product_id.as_str(), l.line.quantity)),
    )
    .await?;

    let id = Uuid::new_v4().to_string();
    let inputs: Vec<LineInput> = input.lines.iter().map(|l| l.line.clone()).collect();
    let (priced, totals) = price_lines(&id, &inputs)?;
    let settlement = settle(input.payment_method, totals, input.amount_received)?;

    let number = next_number(&mut *conn, DocumentType::Invoice, input.doc_date).await?;

    let lines: Vec<InvoiceLine> = priced
        .into_iter()
        .zip(input.lines.iter().zip(&tracked))
        .map(|(line, (sale_line, tracked))| InvoiceLine {
            id: line.id,
            invoice_id: line.document_id,
            line_no: line.line_no,
            product_id: line.product_id,
            quantity_milli: line.quantity_milli,
            unit_price_cents: line.unit_price_cents,
            discount_rate_bps: line.discount_rate_bps,
            discount_cents: line.discount_cents,
            tax_rate_bps: line.tax_rate_bps,
            tax_cents: line.tax_cents,
            amount_cents: line.amount_cents,
            line_total_cents: line.line_total_cents,
            promotion_id: sale_line.promotion_id.clone(),
            stock_tracked: *tracked,
        })
        .collect();

    let header = SalesInvoice {
        id,
        number: number.to_string(),
        doc_date: input.doc_date,
        warehouse_id: input.warehouse_id.clone(),
        customer_id: input.customer_id.clone(),
        table_order_ref: input.table_order_ref.clone(),
        payment_method: input.payment_method,
        transaction_code: input.transaction_code.clone(),
        status: InvoiceStatus::Completed,
        total_amount_cents: settlement.totals.total_amount.cents(),
        total_discount_cents: settlement.totals.total_discount.cents(),
        total_tax_cents: settlement.totals.total_tax.cents(),
        grand_total_cents: settlement.totals.grand_total.cents(),
        amount_received_cents: settlement.amount_received.cents(),
        change_cents: settlement.change.cents(),
        notes: input.notes.clone(),
        created_by: input.created_by.clone(),
        created_at: Utc::now(),
        cancelled_at: None,
        cancelled_by: None,
    };

    InvoiceRepository::insert(&mut *conn, &header, &lines).await?;
    post_tracked(&mut *conn, &header, &lines, PostingKind::Sold).await?;

    info!(
        number = %header.number,
        payment_method = %header.payment_method,
        grand_total = %settlement.totals.grand_total,
        change = %settlement.change,
        table_order = header.table_order_ref.as_deref().unwrap_or("-"),
        "Sale completed"
    );
    Ok(SalesInvoiceDocument { header, lines })
}

/// completed → cancelled, returning stock-tracked quantities to stock.
pub async fn cancel_sale(conn: &mut SqliteConnection, id: &str, actor: &str) -> LedgerResult<SalesInvoiceDocument> {
    let header = load(&mut *conn, id).await?;
    if header.status != InvoiceStatus::Completed {
        return Err(CoreError::invalid_state(label(&header), header.status, "cancel").into());
    }

    if !InvoiceRepository::mark_cancelled(&mut *conn, id, actor, Utc::now()).await? {
        return Err(CoreError::invalid_state(label(&header), InvoiceStatus::Cancelled, "cancel").into());
    }

    let lines = InvoiceRepository::lines(&mut *conn, id).await?;
    post_tracked(&mut *conn, &header, &lines, PostingKind::Sold.opposite()).await?;

    info!(number = %header.number, cancelled_by = %actor, "Sale cancelled");
    let header = load(conn, id).await?;
    Ok(SalesInvoiceDocument { header, lines })
}

async fn post_tracked(
    conn: &mut SqliteConnection,
    header: &SalesInvoice,
    lines: &[InvoiceLine],
    kind: PostingKind,
) -> LedgerResult<()> {
    for line in lines.iter().filter(|l| l.stock_tracked) {
        stock::post(&mut *conn, &line.product_id, &header.warehouse_id, kind, line.quantity(), header.doc_date)
            .await?;
    }
    Ok(())
}

fn label(header: &SalesInvoice) -> String {
    format!("Sales invoice {}", header.number)
}

async fn load(conn: &mut SqliteConnection, id: &str) -> LedgerResult<SalesInvoice> {
    InvoiceRepository::find(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Sales invoice", id).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::stock::{current_stock, post};
    use chrono::NaiveDate;
    use tally_core::{Quantity, Rate, SaleLineInput};
    use tally_db::{Database, DbConfig};

    struct Fixture {
        db: Database,
        wh: String,
        beer: String,
        cocktail: String,
    }

    async fn setup() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let wh = catalog.create_warehouse("BAR", "Bar").await.unwrap().id;
        let beer = catalog
            .create_product("B-1", "Beer", "btl", None, Money::from_cents(500))
            .await
            .unwrap()
            .id;
        let cocktail = catalog
            .create_product("C-1", "Mojito", "glass", None, Money::from_cents(900))
            .await
            .unwrap()
            .id;
        let mixed = catalog.create_category("Cocktails", true).await.unwrap();
        catalog.set_product_category(&cocktail, Some(&mixed.id)).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        post(tx.conn(), &beer, &wh, PostingKind::In, Quantity::from_whole(10), date())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        Fixture { db, wh, beer, cocktail }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 22).unwrap()
    }

    fn sale(fx: &Fixture, method: PaymentMethod, lines: Vec<SaleLineInput>) -> NewSale {
        NewSale {
            doc_date: date(),
            warehouse_id: fx.wh.clone(),
            customer_id: None,
            table_order_ref: None,
            payment_method: method,
            transaction_code: None,
            amount_received: None,
            notes: None,
            lines,
            created_by: "cashier".to_string(),
        }
    }

    fn beer_line(fx: &Fixture, whole: i64) -> SaleLineInput {
        LineInput::new(fx.beer.as_str(), Quantity::from_whole(whole), Money::from_cents(500)).into()
    }

    fn cocktail_line(fx: &Fixture, whole: i64) -> SaleLineInput {
        LineInput::new(fx.cocktail.as_str(), Quantity::from_whole(whole), Money::from_cents(900)).into()
    }

    #[test]
    fn test_settle_non_cash_is_paid_in_full() {
        let totals = DocumentTotals {
            grand_total: Money::from_cents(1234),
            ..DocumentTotals::default()
        };
        let s = settle(PaymentMethod::Credit, totals, None).unwrap();
        assert_eq!(s.amount_received, Money::from_cents(1234));
        assert!(s.change.is_zero());

        let err = settle(PaymentMethod::Cash, totals, Some(Money::from_cents(1000))).unwrap_err();
        assert!(matches!(err, CoreError::PaymentInsufficient { .. }));
    }

    #[tokio::test]
    async fn test_cash_sale_posts_only_tracked_lines() {
        let fx = setup().await;
        let mut tx = fx.db.begin_write().await.unwrap();

        let mut input = sale(&fx, PaymentMethod::Cash, vec![beer_line(&fx, 3), cocktail_line(&fx, 2)]);
        input.amount_received = Some(Money::from_cents(5000));

        let doc = create_sale(tx.conn(), &input).await.unwrap();
        assert_eq!(doc.header.number, "SI/2501/0001");
        assert_eq!(doc.header.status, InvoiceStatus::Completed);
        // 1500 + 1800
        assert_eq!(doc.header.grand_total_cents, 3300);
        assert_eq!(doc.header.change_cents, 1700);
        assert!(doc.lines[0].stock_tracked);
        assert!(!doc.lines[1].stock_tracked);

        assert_eq!(current_stock(tx.conn(), &fx.beer, &fx.wh).await.unwrap(), Quantity::from_whole(7));
        assert!(current_stock(tx.conn(), &fx.cocktail, &fx.wh).await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_insufficient_cash_leaves_no_trace() {
        let fx = setup().await;
        let mut tx = fx.db.begin_write().await.unwrap();

        let mut input = sale(&fx, PaymentMethod::Cash, vec![beer_line(&fx, 2)]);
        input.amount_received = Some(Money::from_cents(999));

        let err = create_sale(tx.conn(), &input).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::PaymentInsufficient { .. })));
        assert_eq!(current_stock(tx.conn(), &fx.beer, &fx.wh).await.unwrap(), Quantity::from_whole(10));
    }

    #[tokio::test]
    async fn test_tracked_shortage_rejected_preparation_ignored() {
        let fx = setup().await;
        let mut tx = fx.db.begin_write().await.unwrap();

        // preparation products never run out
        let mut input = sale(&fx, PaymentMethod::Transfer, vec![cocktail_line(&fx, 50)]);
        input.transaction_code = Some("TRX-1".to_string());
        let doc = create_sale(tx.conn(), &input).await.unwrap();
        assert_eq!(doc.header.amount_received_cents, doc.header.grand_total_cents);

        input.lines = vec![beer_line(&fx, 11)];
        let err = create_sale(tx.conn(), &input).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn test_table_order_reference_checked() {
        let fx = setup().await;
        let mut tx = fx.db.begin_write().await.unwrap();

        let mut input = sale(&fx, PaymentMethod::Credit, vec![beer_line(&fx, 1)]);
        input.customer_id = Some("cust-9".to_string());

        input.table_order_ref = Some("GR/2501/0001".to_string());
        let err = create_sale(tx.conn(), &input).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::Validation(_))));

        input.table_order_ref = Some("TO/2501/0042".to_string());
        let doc = create_sale(tx.conn(), &input).await.unwrap();
        assert_eq!(doc.header.table_order_ref.as_deref(), Some("TO/2501/0042"));
    }

    #[tokio::test]
    async fn test_cancel_restores_tracked_stock_once() {
        let fx = setup().await;
        let mut tx = fx.db.begin_write().await.unwrap();

        let line = LineInput::new(fx.beer.as_str(), Quantity::from_whole(4), Money::from_cents(500))
            .with_discount_rate(Rate::from_percent(10));
        let mut input = sale(&fx, PaymentMethod::Cash, vec![line.into(), cocktail_line(&fx, 1)]);
        input.amount_received = Some(Money::from_cents(10_000));

        let doc = create_sale(tx.conn(), &input).await.unwrap();
        assert_eq!(current_stock(tx.conn(), &fx.beer, &fx.wh).await.unwrap(), Quantity::from_whole(6));

        let cancelled = cancel_sale(tx.conn(), &doc.header.id, "manager").await.unwrap();
        assert_eq!(cancelled.header.status, InvoiceStatus::Cancelled);
        assert_eq!(cancelled.header.cancelled_by.as_deref(), Some("manager"));
        assert_eq!(current_stock(tx.conn(), &fx.beer, &fx.wh).await.unwrap(), Quantity::from_whole(10));

        let err = cancel_sale(tx.conn(), &doc.header.id, "manager").await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidStateTransition { .. })));
    }
}
