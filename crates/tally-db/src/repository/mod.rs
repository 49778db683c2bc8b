//! # Repository Module
//!
//! Database repository implementations for the ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two ways in                                          │
//! │                                                                         │
//! │  Reads outside a write unit                                            │
//! │       db.balances().current_stock(product, warehouse)                  │
//! │       └── repository struct holding the pool                           │
//! │                                                                         │
//! │  Reads and writes inside a write unit                                  │
//! │       let mut tx = db.begin_write().await?;                            │
//! │       BalanceRepository::find(tx.conn(), ..)                           │
//! │       BalanceRepository::update_figures(tx.conn(), ..)                 │
//! │       tx.commit().await?;                                               │
//! │       └── associated fns taking an executor / connection               │
//! │                                                                         │
//! │  The pool methods delegate to the associated fns, so the SQL for an   │
//! │  operation lives in exactly one place.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SequenceRepository`](sequence::SequenceRepository) - Atomic document counters
//! - [`PeriodRepository`](period::PeriodRepository) - Accounting periods
//! - [`BalanceRepository`](balance::BalanceRepository) - Versioned balance rows
//! - [`CatalogRepository`](catalog::CatalogRepository) - Warehouses, categories, products
//! - [`ReceiptRepository`](receipt::ReceiptRepository) - Goods receipts
//! - [`OutboundRepository`](outbound::OutboundRepository) - Outbound movements
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Sales invoices

pub mod balance;
pub mod catalog;
pub mod invoice;
mod lines;
pub mod outbound;
pub mod period;
pub mod receipt;
pub mod sequence;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::pool::{Database, DbConfig};
    use tally_core::{Money, Product, Warehouse};

    /// Fresh in-memory database with one warehouse and one product.
    pub async fn seeded() -> (Database, Warehouse, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let wh = catalog.create_warehouse("MAIN", "Main store").await.unwrap();
        let product = catalog
            .create_product("SKU-1", "Coffee beans", "kg", None, Money::from_cents(1500))
            .await
            .unwrap();
        (db, wh, product)
    }
}
