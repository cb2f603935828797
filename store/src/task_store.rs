//! Idempotent task persistence (spec §4.4, §3 `Task`), and the
//! `kernel::dispatch::TaskSink` adapter the dispatcher calls through.

use crate::error::StoreError;
use crate::models::{Task, TaskStatusDb};
use async_trait::async_trait;
use chrono::Utc;
use kernel::dispatch::{TaskRecord, TaskSink, TaskStatus};
use kernel::error::ErrorKind;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct TaskStore {
    pool: PgPool,
}

impl TaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new task row for `workflow_id`, or return the existing row
    /// if the `(workflow_id, agent_role, skill_name, parameters_hash)`
    /// tuple already exists (spec §4.4: never execute a skill twice).
    pub async fn submit(
        &self,
        workflow_id: Uuid,
        agent_role: &str,
        skill_name: &str,
        parameters: &Value,
        parameters_hash: &str,
        correlation_id: &str,
        max_retries: i32,
    ) -> Result<Task, StoreError> {
        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks
                (id, workflow_id, agent_role, skill_name, parameters, parameters_hash,
                 status, priority, retry_count, max_retries, correlation_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'submitted', 0, 0, $7, $8, now(), now())
            ON CONFLICT (workflow_id, agent_role, skill_name, parameters_hash) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(workflow_id)
        .bind(agent_role)
        .bind(skill_name)
        .bind(parameters)
        .bind(parameters_hash)
        .bind(max_retries)
        .bind(correlation_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(task) => Ok(task),
            None => self
                .find(workflow_id, agent_role, skill_name, parameters_hash)
                .await?
                .ok_or_else(|| {
                    StoreError::Conflict(format!(
                        "task insert conflicted but no existing row found for {agent_role}/{skill_name}"
                    ))
                }),
        }
    }

    pub async fn find(
        &self,
        workflow_id: Uuid,
        agent_role: &str,
        skill_name: &str,
        parameters_hash: &str,
    ) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE workflow_id = $1 AND agent_role = $2 AND skill_name = $3 AND parameters_hash = $4",
        )
        .bind(workflow_id)
        .bind(agent_role)
        .bind(skill_name)
        .bind(parameters_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Result<Task, StoreError> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub async fn mark_working(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE tasks SET status = 'working', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn complete(&self, id: Uuid, result: Value) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE tasks SET status = 'completed', result = $2, updated_at = now(), completed_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a task failed; if `retry_count < max_retries`, instead schedule
    /// it for `retry_pending` at `next_retry_at` (spec §4.5 task-level retry).
    pub async fn fail(
        &self,
        id: Uuid,
        error: &str,
        next_retry_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let task = self.get(id).await?;
        if task.retry_count + 1 < task.max_retries {
            if let Some(next) = next_retry_at {
                sqlx::query(
                    "UPDATE tasks SET status = 'retry_pending', retry_count = retry_count + 1, error = $2, next_retry_at = $3, updated_at = now() WHERE id = $1",
                )
                .bind(id)
                .bind(error)
                .bind(next)
                .execute(&self.pool)
                .await?;
                return Ok(());
            }
        }
        sqlx::query(
            "UPDATE tasks SET status = 'failed', retry_count = retry_count + 1, error = $2, updated_at = now(), completed_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn cancel(&self, id: Uuid) -> Result<(), StoreError> {
        let task = self.get(id).await?;
        if matches!(
            task.status,
            TaskStatusDb::Completed | TaskStatusDb::Failed | TaskStatusDb::Cancelled
        ) {
            return Err(StoreError::Conflict(format!("task {id} already terminal")));
        }
        sqlx::query("UPDATE tasks SET status = 'cancelled', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Tasks due for recovery: `retry_pending` with an elapsed
    /// `next_retry_at`, or `stuck` (spec §4.5 recovery daemon).
    pub async fn due_for_recovery(&self) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE status = 'stuck' OR (status = 'retry_pending' AND next_retry_at <= now())",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn to_task_status(status: TaskStatusDb) -> TaskStatus {
    match status {
        TaskStatusDb::Completed => TaskStatus::Completed,
        TaskStatusDb::Failed | TaskStatusDb::Stuck => TaskStatus::Failed,
        TaskStatusDb::Cancelled | TaskStatusDb::Skipped => TaskStatus::Cancelled,
        TaskStatusDb::Submitted | TaskStatusDb::Working | TaskStatusDb::RetryPending => {
            TaskStatus::Running
        }
    }
}

/// Adapter letting `kernel::dispatch::Dispatcher` persist through this
/// store without `kernel` depending on `sqlx`. The workflow id is fixed
/// per-agent-process-lifetime at construction (each skill call belongs to
/// whichever workflow the Coordinator is currently driving); agents that
/// are not workflow-scoped bind a per-process synthetic workflow id.
#[derive(Clone)]
pub struct TaskSinkAdapter {
    pub store: TaskStore,
    pub workflow_id: Uuid,
}

#[async_trait]
impl TaskSink for TaskSinkAdapter {
    async fn find_existing(
        &self,
        agent_role: &str,
        skill_name: &str,
        parameters_hash: &str,
    ) -> Result<Option<TaskRecord>, ErrorKind> {
        let found = self
            .store
            .find(self.workflow_id, agent_role, skill_name, parameters_hash)
            .await
            .map_err(ErrorKind::from)?;
        Ok(found.map(|t| TaskRecord {
            id: t.id.to_string(),
            status: to_task_status(t.status),
            result: t.result,
            error: t.error,
        }))
    }

    async fn start(
        &self,
        agent_role: &str,
        skill_name: &str,
        parameters_hash: &str,
        params: &Value,
    ) -> Result<TaskRecord, ErrorKind> {
        let correlation_id = Uuid::new_v4().to_string();
        let task = self
            .store
            .submit(
                self.workflow_id,
                agent_role,
                skill_name,
                params,
                parameters_hash,
                &correlation_id,
                3,
            )
            .await
            .map_err(ErrorKind::from)?;
        self.store.mark_working(task.id).await.map_err(ErrorKind::from)?;
        Ok(TaskRecord {
            id: task.id.to_string(),
            status: TaskStatus::Running,
            result: None,
            error: None,
        })
    }

    async fn complete(&self, task_id: &str, result: Value) -> Result<(), ErrorKind> {
        let id = Uuid::parse_str(task_id)
            .map_err(|e| ErrorKind::Fatal(format!("invalid task id {task_id}: {e}")))?;
        self.store.complete(id, result).await.map_err(ErrorKind::from)
    }

    async fn fail(&self, task_id: &str, error: &str) -> Result<(), ErrorKind> {
        let id = Uuid::parse_str(task_id)
            .map_err(|e| ErrorKind::Fatal(format!("invalid task id {task_id}: {e}")))?;
        self.store.fail(id, error, None).await.map_err(ErrorKind::from)
    }
}
