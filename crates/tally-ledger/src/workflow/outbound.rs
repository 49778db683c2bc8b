//! # Outbound Movement Workflow
//!
//! Stock leaving a warehouse: supplier returns, inter-warehouse transfers
//! and write-off adjustments.
//!
//! ## Transfer Confirmation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  One write unit:                                                        │
//! │                                                                         │
//! │  1. current stock at source ≥ requested, for every product              │
//! │       └── otherwise InsufficientStock, nothing posted                   │
//! │  2. status draft → confirmed                                            │
//! │  3. OUT every line at source                                            │
//! │  4. IN  every line at destination                                       │
//! │                                                                         │
//! │  Any failure (e.g. destination period closed) rolls back 2-3 as well.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{post_lines, price_lines, require_products, require_warehouse};
use crate::error::LedgerResult;
use crate::sequence::next_number;
use crate::stock::check_availability;
use tally_core::validation::{validate_lines, validate_outbound_references, validate_required};
use tally_core::{
    CoreError, DocumentLine, DocumentStatus, DocumentType, NewOutbound, OutboundDocument, OutboundKind,
    OutboundMovement, PostingKind,
};
use tally_db::OutboundRepository;

/// Creates a draft movement. No ledger effect.
pub async fn create(conn: &mut SqliteConnection, input: &NewOutbound) -> LedgerResult<OutboundDocument> {
    validate_required("warehouse_id", &input.warehouse_id)?;
    validate_required("created_by", &input.created_by)?;
    validate_outbound_references(input)?;
    validate_lines(input.lines.iter())?;

    require_warehouse(&mut *conn, &input.warehouse_id).await?;
    if let Some(destination) = input.destination_warehouse_id.as_deref() {
        require_warehouse(&mut *conn, destination).await?;
    }
    require_products(&mut *conn, input.lines.iter().map(|l| l.product_id.as_str())).await?;

    let number = next_number(&mut *conn, DocumentType::Outbound, input.doc_date).await?;
    let id = Uuid::new_v4().to_string();
    let (lines, totals) = price_lines(&id, &input.lines)?;

    let header = OutboundMovement {
        id,
        number: number.to_string(),
        doc_date: input.doc_date,
        kind: input.kind,
        warehouse_id: input.warehouse_id.clone(),
        // Only the kind that uses a reference keeps it
        destination_warehouse_id: match input.kind {
            OutboundKind::Transfer => input.destination_warehouse_id.clone(),
            _ => None,
        },
        supplier_id: input.supplier_id.clone(),
        reason: input.reason.clone(),
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

    OutboundRepository::insert(&mut *conn, &header, &lines).await?;

    info!(number = %header.number, kind = %header.kind, lines = lines.len(), "Outbound movement created");
    Ok(OutboundDocument { header, lines })
}

/// draft → confirmed: OUT at the source, plus IN at the destination for
/// transfers. All-or-nothing on insufficient stock.
pub async fn confirm(conn: &mut SqliteConnection, id: &str, actor: &str) -> LedgerResult<OutboundDocument> {
    let header = load(&mut *conn, id).await?;
    if header.status != DocumentStatus::Draft {
        return Err(CoreError::invalid_state(label(&header), header.status, "confirm").into());
    }
    let destination = references(&header)?;

    let lines = OutboundRepository::lines(&mut *conn, id).await?;
    check_availability(
        &mut *conn,
        &header.warehouse_id,
        lines.iter().map(|l| (l.product_id.as_str(), l.quantity())),
    )
    .await?;

    transition(&mut *conn, &header, DocumentStatus::Draft, DocumentStatus::Confirmed, actor).await?;

    post_lines(&mut *conn, &lines, &header.warehouse_id, PostingKind::Out, header.doc_date).await?;
    if let Some(destination) = destination {
        post_lines(&mut *conn, &lines, destination, PostingKind::In, header.doc_date).await?;
    }

    info!(number = %header.number, kind = %header.kind, confirmed_by = %actor, "Outbound movement confirmed");
    reload(conn, id, lines).await
}

/// Cancels a movement, undoing both legs of a confirmed transfer.
pub async fn cancel(conn: &mut SqliteConnection, id: &str, actor: &str) -> LedgerResult<OutboundDocument> {
    let header = load(&mut *conn, id).await?;
    let lines = OutboundRepository::lines(&mut *conn, id).await?;

    match header.status {
        DocumentStatus::Draft => {
            transition(&mut *conn, &header, DocumentStatus::Draft, DocumentStatus::Cancelled, actor).await?;
        }
        DocumentStatus::Confirmed => {
            let destination = references(&header)?;
            transition(&mut *conn, &header, DocumentStatus::Confirmed, DocumentStatus::Cancelled, actor).await?;

            post_lines(
                &mut *conn,
                &lines,
                &header.warehouse_id,
                PostingKind::Out.opposite(),
                header.doc_date,
            )
            .await?;
            if let Some(destination) = destination {
                post_lines(&mut *conn, &lines, destination, PostingKind::In.opposite(), header.doc_date).await?;
            }
        }
        DocumentStatus::Cancelled => {
            return Err(CoreError::invalid_state(label(&header), header.status, "cancel").into());
        }
    }

    info!(number = %header.number, was = %header.status, cancelled_by = %actor, "Outbound movement cancelled");
    reload(conn, id, lines).await
}

/// The destination warehouse of a transfer, after checking the references
/// the kind requires.
fn references(header: &OutboundMovement) -> LedgerResult<Option<&str>> {
    let document = label(header);
    match header.kind {
        OutboundKind::Transfer => match header.destination_warehouse_id.as_deref() {
            Some(dest) => Ok(Some(dest)),
            None => Err(CoreError::missing_reference(document, "destination_warehouse_id").into()),
        },
        OutboundKind::Return => match header.supplier_id.as_deref() {
            Some(_) => Ok(None),
            None => Err(CoreError::missing_reference(document, "supplier_id").into()),
        },
        OutboundKind::Adjustment => Ok(None),
    }
}

fn label(header: &OutboundMovement) -> String {
    format!("Outbound {} ({})", header.number, header.kind)
}

async fn load(conn: &mut SqliteConnection, id: &str) -> LedgerResult<OutboundMovement> {
    OutboundRepository::find(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Outbound movement", id).into())
}

async fn transition(
    conn: &mut SqliteConnection,
    header: &OutboundMovement,
    from: DocumentStatus,
    to: DocumentStatus,
    actor: &str,
) -> LedgerResult<()> {
    if !OutboundRepository::transition(conn, &header.id, from, to, actor, Utc::now()).await? {
        let operation = if to == DocumentStatus::Confirmed { "confirm" } else { "cancel" };
        return Err(CoreError::invalid_state(label(header), from, operation).into());
    }
    Ok(())
}

async fn reload(conn: &mut SqliteConnection, id: &str, lines: Vec<DocumentLine>) -> LedgerResult<OutboundDocument> {
    let header = load(conn, id).await?;
    Ok(OutboundDocument { header, lines })
}
