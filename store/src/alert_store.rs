//! AlertBatch/AlertDelivery persistence (spec §3, §4.6 step 6). The
//! `alert_batch_items` join table has no direct counterpart in spec §3's
//! prose but is required to relate a batch to the SummaryRecords it groups.

use crate::error::StoreError;
use crate::models::{AlertBatch, AlertBatchStatus, AlertDelivery, SummaryRecord};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AlertStore {
    pool: PgPool,
}

impl AlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_batch(&self, priority: i32, schedule_type: &str) -> Result<AlertBatch, StoreError> {
        let row = sqlx::query_as::<_, AlertBatch>(
            "INSERT INTO alert_batches (status, priority, schedule_type) VALUES ('pending', $1, $2) RETURNING *",
        )
        .bind(priority)
        .bind(schedule_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn add_item(&self, batch_id: i64, summary_id: i64) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO alert_batch_items (batch_id, summary_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(batch_id)
            .bind(summary_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn items_for_batch(&self, batch_id: i64) -> Result<Vec<SummaryRecord>, StoreError> {
        let rows = sqlx::query_as::<_, SummaryRecord>(
            r#"
            SELECT s.* FROM summary_records s
            JOIN alert_batch_items i ON i.summary_id = s.id
            WHERE i.batch_id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Upserts the per-(batch, channel) delivery row, used for both the
    /// initial `pending` insert and later status/error updates.
    pub async fn record_delivery(
        &self,
        batch_id: i64,
        channel: &str,
        status: &str,
        last_error: Option<&str>,
    ) -> Result<AlertDelivery, StoreError> {
        let row = sqlx::query_as::<_, AlertDelivery>(
            r#"
            INSERT INTO alert_deliveries (batch_id, channel, status, retry_count, last_error, updated_at)
            VALUES ($1, $2, $3, 0, $4, now())
            ON CONFLICT (batch_id, channel) DO UPDATE SET
                status = EXCLUDED.status,
                retry_count = alert_deliveries.retry_count + 1,
                last_error = EXCLUDED.last_error,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(batch_id)
        .bind(channel)
        .bind(status)
        .bind(last_error)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn deliveries_for_batch(&self, batch_id: i64) -> Result<Vec<AlertDelivery>, StoreError> {
        let rows = sqlx::query_as::<_, AlertDelivery>("SELECT * FROM alert_deliveries WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn set_status(&self, batch_id: i64, status: AlertBatchStatus) -> Result<(), StoreError> {
        let sent_at_clause = if matches!(status, AlertBatchStatus::Sent) {
            "sent_at = now()"
        } else {
            "sent_at = sent_at"
        };
        let query = format!("UPDATE alert_batches SET status = $2, {sent_at_clause} WHERE id = $1");
        sqlx::query(&query)
            .bind(batch_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
