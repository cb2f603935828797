//! Registry-mirror rows, updated on every heartbeat (spec §3 `AgentState`).
//! Complements `kernel::registry` (Redis, ephemeral) with a durable record
//! an operator can query after the Redis key has expired.

use crate::error::StoreError;
use crate::models::AgentState;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AgentStateStore {
    pool: PgPool,
}

impl AgentStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn heartbeat(
        &self,
        agent_role: &str,
        status: &str,
        current_task_id: Option<Uuid>,
        capabilities: &Value,
    ) -> Result<AgentState, StoreError> {
        let row = sqlx::query_as::<_, AgentState>(
            r#"
            INSERT INTO agent_states (agent_role, status, current_task_id, heartbeat_at, capabilities)
            VALUES ($1, $2, $3, now(), $4)
            ON CONFLICT (agent_role) DO UPDATE SET
                status = EXCLUDED.status,
                current_task_id = EXCLUDED.current_task_id,
                heartbeat_at = now(),
                capabilities = EXCLUDED.capabilities
            RETURNING *
            "#,
        )
        .bind(agent_role)
        .bind(status)
        .bind(current_task_id)
        .bind(capabilities)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Rows whose `heartbeat_at` is older than `ttl` are treated as
    /// agent-down (spec §3).
    pub async fn stale(&self, ttl: chrono::Duration) -> Result<Vec<AgentState>, StoreError> {
        let cutoff = chrono::Utc::now() - ttl;
        let rows = sqlx::query_as::<_, AgentState>("SELECT * FROM agent_states WHERE heartbeat_at < $1")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
