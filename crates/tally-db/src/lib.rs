//! # tally-db: Storage Layer for the Tally Ledger
//!
//! SQLite storage for sequences, periods, balances and the three document
//! families, accessed asynchronously through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Data Flow                                  │
//! │                                                                         │
//! │  Ledger::confirm_receipt(id, actor)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Sequence      │    │              │  │   │
//! │  │   │ SqlitePool    │    │ Period        │    │ 001_ledger_  │  │   │
//! │  │   │ Write gate    │◄───│ Balance       │    │  schema.sql  │  │   │
//! │  │   │ WriteTx       │    │ Receipt ...   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration and write units
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Storage error types
//! - [`repository`] - One repository per table family
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{BalanceRepository, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//!
//! // Pool-level read
//! let on_hand = db.balances().current_stock(&product_id, &warehouse_id).await?;
//!
//! // Unit of work
//! let mut tx = db.begin_write().await?;
//! let row = BalanceRepository::find(tx.conn(), &period_id, &product_id, &warehouse_id).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, WriteTx};

pub use repository::balance::BalanceRepository;
pub use repository::catalog::{CatalogRepository, StockProfile};
pub use repository::invoice::InvoiceRepository;
pub use repository::outbound::OutboundRepository;
pub use repository::period::PeriodRepository;
pub use repository::receipt::ReceiptRepository;
pub use repository::sequence::SequenceRepository;
