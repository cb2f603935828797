//! Content-hash dedup, consulted by Summarise before calling the LLM
//! (spec §4.4).

use crate::error::StoreError;
use crate::models::SummaryRecord;
use sqlx::PgPool;

#[derive(Clone)]
pub struct DedupStore {
    pool: PgPool,
}

impl DedupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A hit means a SummaryRecord already exists for substantively
    /// identical content; the caller should reuse it instead of
    /// re-summarising.
    pub async fn lookup(&self, content_hash: &str) -> Result<Option<SummaryRecord>, StoreError> {
        let row = sqlx::query_as::<_, SummaryRecord>(
            r#"
            SELECT s.* FROM summary_records s
            JOIN content_dedup d ON d.summary_id = s.id
            WHERE d.content_hash = $1
            "#,
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a freshly created SummaryRecord's hash in the same
    /// transaction as the record itself, so a miss can never be observed
    /// without its summary (spec §4.4).
    pub async fn record(
        &self,
        filter_id: i64,
        summary_text: &str,
        model_used: &str,
        compression_ratio: f64,
        sentiment: Option<&str>,
        confidence: f64,
        content_hash: &str,
    ) -> Result<SummaryRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        let summary = sqlx::query_as::<_, SummaryRecord>(
            r#"
            INSERT INTO summary_records
                (filter_id, summary_text, model_used, compression_ratio, sentiment, confidence)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(filter_id)
        .bind(summary_text)
        .bind(model_used)
        .bind(compression_ratio)
        .bind(sentiment)
        .bind(confidence)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO content_dedup (content_hash, summary_id) VALUES ($1, $2)")
            .bind(content_hash)
            .bind(summary.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(summary)
    }
}
