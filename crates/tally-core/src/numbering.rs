//! # Document Numbering
//!
//! Every document gets a human-readable number that is unique across the
//! store and sorts by issue order within a month:
//!
//! ```text
//!        GR / 2501 / 0007
//!        ──   ────   ────
//!        │     │      └── counter, zero-padded to 4 digits, never reused
//!        │     └───────── YYMM of the document date
//!        └─────────────── prefix, fixed per document type
//! ```
//!
//! | Document type | Prefix |
//! |---------------|--------|
//! | Receipt       | `GR`   |
//! | Outbound      | `GI`   |
//! | Invoice       | `SI`   |
//! | Table order   | `TO`   |
//!
//! Counters past 9999 are printed in full; the format never truncates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::period::YearMonth;

// =============================================================================
// Document Type
// =============================================================================

/// The kinds of documents that draw numbers from the sequence generator.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Receipt,
    Outbound,
    Invoice,
    /// Numbers issued to the external table-order subsystem.
    TableOrder,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Receipt,
        DocumentType::Outbound,
        DocumentType::Invoice,
        DocumentType::TableOrder,
    ];

    /// The two-letter number prefix.
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentType::Receipt => "GR",
            DocumentType::Outbound => "GI",
            DocumentType::Invoice => "SI",
            DocumentType::TableOrder => "TO",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<DocumentType> {
        Self::ALL.into_iter().find(|t| t.prefix() == prefix)
    }

    /// Storage key used by the sequence table.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Receipt => "receipt",
            DocumentType::Outbound => "outbound",
            DocumentType::Invoice => "invoice",
            DocumentType::TableOrder => "table_order",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Document Number
// =============================================================================

/// A parsed `PREFIX/YYMM/NNNN` document number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentNumber {
    pub doc_type: DocumentType,
    pub year_month: YearMonth,
    pub counter: u32,
}

impl DocumentNumber {
    pub fn new(doc_type: DocumentType, year_month: YearMonth, counter: u32) -> Self {
        DocumentNumber {
            doc_type,
            year_month,
            counter,
        }
    }

    /// Parses a rendered number back into its parts.
    ///
    /// ```rust
    /// use tally_core::numbering::{DocumentNumber, DocumentType};
    ///
    /// let n = DocumentNumber::parse("GR/2501/0007").unwrap();
    /// assert_eq!(n.doc_type, DocumentType::Receipt);
    /// assert_eq!(n.counter, 7);
    /// assert_eq!(n.to_string(), "GR/2501/0007");
    /// ```
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::invalid_format("document_number", "expected PREFIX/YYMM/NNNN");

        let mut parts = s.split('/');
        let (Some(prefix), Some(ym), Some(counter), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let doc_type = DocumentType::from_prefix(prefix).ok_or_else(|| {
            ValidationError::invalid_format("document_number", format!("unknown prefix {prefix}"))
        })?;
        let year_month: YearMonth = ym.parse()?;

        if counter.len() < 4 || !counter.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let counter: u32 = counter.parse().map_err(|_| invalid())?;
        if counter == 0 {
            return Err(invalid());
        }

        Ok(DocumentNumber::new(doc_type, year_month, counter))
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{:04}",
            self.doc_type.prefix(),
            self.year_month,
            self.counter
        )
    }
}

impl FromStr for DocumentNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentNumber::parse(s)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
