//! Workflow creation, checkpointing, and stage transitions (spec §3, §4.6).

use crate::error::StoreError;
use crate::models::{Workflow, WorkflowStatus};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct WorkflowStore {
    pool: PgPool,
}

impl WorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a new monitoring cycle (spec §4.6 step 2).
    pub async fn create(&self, config: Value) -> Result<Workflow, StoreError> {
        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, Workflow>(
            r#"
            INSERT INTO workflows (id, workflow_type, status, config, current_stage, checkpoint, metrics)
            VALUES ($1, 'monitoring_cycle', 'running', $2, 'collecting', '{}', '{}')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(config)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Result<Workflow, StoreError> {
        sqlx::query_as::<_, Workflow>("SELECT * FROM workflows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Advance `current_stage` and persist a checkpoint blob (spec §4.6
    /// step 7: `{stage, completed_items, pending_items}`).
    pub async fn checkpoint(
        &self,
        id: Uuid,
        stage: &str,
        completed_items: &[String],
        pending_items: &[String],
    ) -> Result<(), StoreError> {
        let checkpoint = json!({
            "stage": stage,
            "completed_items": completed_items,
            "pending_items": pending_items,
        });
        sqlx::query(
            "UPDATE workflows SET current_stage = $2, checkpoint = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(stage)
        .bind(checkpoint)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_status(&self, id: Uuid, status: WorkflowStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE workflows SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Close out a finished cycle: final status plus `last_run_at`/`next_run_at`
    /// (spec §4.6 step 8).
    pub async fn finish(
        &self,
        id: Uuid,
        status: WorkflowStatus,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE workflows SET status = $2, last_run_at = $3, next_run_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(last_run_at)
        .bind(next_run_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The workflow whose `checkpoint` is non-terminal for the most recent
    /// cycle, if any — used on restart to resume from the last checkpoint
    /// (spec §4.6 edge cases).
    pub async fn resumable(&self) -> Result<Option<Workflow>, StoreError> {
        let row = sqlx::query_as::<_, Workflow>(
            "SELECT * FROM workflows WHERE status = 'running' ORDER BY last_run_at DESC NULLS LAST LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
