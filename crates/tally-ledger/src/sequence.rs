//! # Sequence Generator
//!
//! Issues `PREFIX/YYMM/NNNN` numbers, scoped by document type and month.
//!
//! ```text
//! next_number(Receipt, 2025-01-14)
//!      │
//!      ▼
//! YearMonth "2501" ──► atomic upsert-and-increment ──► 7 ──► "GR/2501/0007"
//! ```
//!
//! The increment belongs to the caller's write unit: if the unit rolls back,
//! the number was never issued. Once committed, it is never handed out again,
//! even if its document is later cancelled.

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::error::LedgerResult;
use tally_core::{DocumentNumber, DocumentType, YearMonth};
use tally_db::{DbError, SequenceRepository};

/// Reserves the next number for `doc_type` in the month of `date`.
pub async fn next_number(
    conn: &mut SqliteConnection,
    doc_type: DocumentType,
    date: NaiveDate,
) -> LedgerResult<DocumentNumber> {
    let year_month = YearMonth::from_date(date);
    let value = SequenceRepository::next_value(conn, doc_type, year_month).await?;

    let counter = u32::try_from(value)
        .map_err(|_| DbError::Internal(format!("{doc_type} sequence {year_month} out of range: {value}")))?;

    Ok(DocumentNumber::new(doc_type, year_month, counter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_db::{Database, DbConfig};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_scoped_by_type_and_month() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();

        let a = next_number(tx.conn(), DocumentType::Receipt, date(2025, 1, 2)).await.unwrap();
        let b = next_number(tx.conn(), DocumentType::Receipt, date(2025, 1, 31)).await.unwrap();
        let c = next_number(tx.conn(), DocumentType::Outbound, date(2025, 1, 5)).await.unwrap();
        let d = next_number(tx.conn(), DocumentType::Receipt, date(2025, 2, 1)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(a.to_string(), "GR/2501/0001");
        assert_eq!(b.to_string(), "GR/2501/0002");
        assert_eq!(c.to_string(), "GI/2501/0001");
        assert_eq!(d.to_string(), "GR/2502/0001");
    }

    #[tokio::test]
    async fn test_rolled_back_number_is_not_issued() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut tx = db.begin_write().await.unwrap();
            next_number(tx.conn(), DocumentType::Invoice, date(2025, 3, 1)).await.unwrap();
            // dropped without commit
        }

        let mut tx = db.begin_write().await.unwrap();
        let n = next_number(tx.conn(), DocumentType::Invoice, date(2025, 3, 1)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(n.to_string(), "SI/2503/0001");
    }
}
