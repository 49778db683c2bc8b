//! # Sequence Repository
//!
//! Document counters, one row per (document type, YYMM).
//!
//! ## Increment
//! ```text
//! INSERT (type, yymm, last_number = 1)
//!   ON CONFLICT (type, yymm) DO UPDATE SET last_number = last_number + 1
//!   RETURNING last_number
//! ```
//! One statement both creates the row lazily and increments it, so two
//! callers can never read the same counter value. The counter only becomes
//! visible when the surrounding transaction commits; a rolled-back unit
//! consumes nothing.

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::{DocumentType, Sequence, YearMonth};

/// Repository for document sequences.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Increments (creating if needed) the counter and returns the new value.
    pub async fn next_value<'e, E: SqliteExecutor<'e>>(
        exec: E,
        doc_type: DocumentType,
        year_month: YearMonth,
    ) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (doc_type, year_month, prefix, last_number, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            ON CONFLICT (doc_type, year_month)
            DO UPDATE SET last_number = last_number + 1, updated_at = excluded.updated_at
            RETURNING last_number
            "#,
        )
        .bind(doc_type)
        .bind(year_month.to_string())
        .bind(doc_type.prefix())
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;

        debug!(doc_type = %doc_type, year_month = %year_month, value, "Sequence incremented");
        Ok(value)
    }

    pub async fn find<'e, E: SqliteExecutor<'e>>(
        exec: E,
        doc_type: DocumentType,
        year_month: YearMonth,
    ) -> DbResult<Option<Sequence>> {
        let row = sqlx::query_as::<_, Sequence>(
            r#"
            SELECT doc_type, year_month, prefix, last_number, updated_at
            FROM document_sequences
            WHERE doc_type = ?1 AND year_month = ?2
            "#,
        )
        .bind(doc_type)
        .bind(year_month.to_string())
        .fetch_optional(exec)
        .await?;

        Ok(row)
    }

    /// Current counter row for a scope, if any number was issued.
    pub async fn get(&self, doc_type: DocumentType, year_month: YearMonth) -> DbResult<Option<Sequence>> {
        Self::find(&self.pool, doc_type, year_month).await
    }

    /// All counters, newest month first.
    pub async fn list(&self) -> DbResult<Vec<Sequence>> {
        let rows = sqlx::query_as::<_, Sequence>(
            r#"
            SELECT doc_type, year_month, prefix, last_number, updated_at
            FROM document_sequences
            ORDER BY year_month DESC, doc_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_counter_starts_at_one_and_increments() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        for expected in 1..=3 {
            let mut tx = db.begin_write().await.unwrap();
            let v = SequenceRepository::next_value(tx.conn(), DocumentType::Receipt, ym("2501"))
                .await
                .unwrap();
            tx.commit().await.unwrap();
            assert_eq!(v, expected);
        }

        let row = db
            .sequences()
            .get(DocumentType::Receipt, ym("2501"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.last_number, 3);
        assert_eq!(row.prefix, "GR");
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();

        let a = SequenceRepository::next_value(tx.conn(), DocumentType::Receipt, ym("2501")).await.unwrap();
        let b = SequenceRepository::next_value(tx.conn(), DocumentType::Receipt, ym("2502")).await.unwrap();
        let c = SequenceRepository::next_value(tx.conn(), DocumentType::Invoice, ym("2501")).await.unwrap();
        let d = SequenceRepository::next_value(tx.conn(), DocumentType::TableOrder, ym("2501")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!((a, b, c, d), (1, 1, 1, 1));
        assert_eq!(db.sequences().list().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_rolled_back_increment_is_not_consumed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut tx = db.begin_write().await.unwrap();
            SequenceRepository::next_value(tx.conn(), DocumentType::Outbound, ym("2501"))
                .await
                .unwrap();
        }

        let mut tx = db.begin_write().await.unwrap();
        let v = SequenceRepository::next_value(tx.conn(), DocumentType::Outbound, ym("2501"))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(v, 1);
    }
}
