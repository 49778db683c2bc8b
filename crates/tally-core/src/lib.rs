//! # tally-core: Pure Ledger Logic for Tally
//!
//! This crate holds everything about the inventory ledger that can be
//! decided without touching storage: how a posting changes a balance, how a
//! document line is priced, which period a date falls into, and what a
//! document number looks like.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          API layer / table-order subsystem (external)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                tally-ledger (engine)                            │   │
//! │  │   Sequence Generator · Period Manager · Stock Ledger · Workflows│   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌───────┐ │   │
//! │  │  │ quantity │ │  money   │ │  period  │ │numbering │ │balance│ │   │
//! │  │  └──────────┘ └──────────┘ └──────────┘ └──────────┘ └───────┘ │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌──────────┐                         │   │
//! │  │  │ pricing  │ │  types   │ │validation│                         │   │
//! │  │  └──────────┘ └──────────┘ └──────────┘                         │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`quantity`] - Fixed-point signed stock quantities
//! - [`money`] - Integer money and basis-point rates
//! - [`period`] - Accounting period codes (`YYYY-MM`) and sequence months (`YYMM`)
//! - [`numbering`] - Document types, prefixes and the `PREFIX/YYMM/NNNN` format
//! - [`balance`] - The posting primitive's arithmetic
//! - [`pricing`] - Document line amounts and totals
//! - [`types`] - Rows and inputs shared with the database and API layers
//! - [`validation`] - Workflow preconditions
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::balance::{BalanceFigures, PostingKind};
//! use tally_core::quantity::Quantity;
//!
//! let mut figures = BalanceFigures::opening(Quantity::from_whole(4));
//! figures.post(PostingKind::In, Quantity::from_whole(10)).unwrap();
//! figures.post(PostingKind::Sold, Quantity::from_whole(3)).unwrap();
//!
//! assert_eq!(figures.closing, Quantity::from_whole(11));
//! assert!(figures.is_consistent());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod balance;
pub mod error;
pub mod money;
pub mod numbering;
pub mod period;
pub mod pricing;
pub mod quantity;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use balance::{BalanceFigures, PostingKind};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use numbering::{DocumentNumber, DocumentType};
pub use period::{PeriodCode, YearMonth};
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines a single document may carry.
///
/// ## Business Reason
/// Keeps one confirmation (and therefore one write transaction) bounded.
pub const MAX_DOCUMENT_LINES: usize = 500;
