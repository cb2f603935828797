//! Row types for the monitoring-pipeline schema (spec §3).
//!
//! New code: no relational schema existed upstream. Modeled with
//! `sqlx::FromRow` the way `tasker-systems-tasker-core` models Postgres
//! rows — one struct per table, `chrono::DateTime<Utc>` for every
//! timestamp, `serde_json::Value` for JSON columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Variant discriminant for `ContentItem` (stored as a Postgres enum/text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "content_variant", rename_all = "lowercase")]
pub enum ContentVariant {
    Post,
    Comment,
}

/// A post fetched by Retrieval. `external_id` is the platform-native
/// opaque identifier (spec §3 invariant: unique per variant).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub external_id: String,
    pub community: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub score: i32,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

/// A comment fetched by Retrieval. `internal_post_id` is nullable and set
/// asynchronously once the parent Post's internal key is known (spec §3).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub external_id: String,
    pub external_post_id: String,
    pub internal_post_id: Option<i64>,
    /// Platform's typed parent reference ("kind-prefix + id"), preserved
    /// verbatim so the reply hierarchy is reconstructible without a join.
    pub parent_ref: String,
    pub body: String,
    pub author: String,
    pub score: i32,
    pub created_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

/// A topic locus (e.g. a subreddit). Soft-deleted, never hard-deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub discovered_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Relevance scoring for one ContentItem (spec §3: 1-1 with the item via
/// unique `(item_variant, item_id)`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FilterRecord {
    pub id: i64,
    pub item_variant: ContentVariant,
    pub item_id: i64,
    pub topic: String,
    pub keyword_score: f64,
    pub semantic_score: f64,
    pub combined_score: f64,
    pub is_relevant: bool,
    pub created_at: DateTime<Utc>,
}

/// One successfully summarised FilterRecord. Append-only, unique on
/// `filter_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: i64,
    pub filter_id: i64,
    pub summary_text: String,
    pub model_used: String,
    pub compression_ratio: f64,
    pub sentiment: Option<String>,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_batch_status", rename_all = "lowercase")]
pub enum AlertBatchStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

/// A set of SummaryRecords grouped for one notification cycle.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AlertBatch {
    pub id: i64,
    pub status: AlertBatchStatus,
    pub priority: i32,
    pub schedule_type: String,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// One (batch, channel) delivery attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AlertDelivery {
    pub id: i64,
    pub batch_id: i64,
    pub channel: String,
    pub status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
pub enum TaskStatusDb {
    Submitted,
    Working,
    Completed,
    Failed,
    RetryPending,
    Stuck,
    Skipped,
    Cancelled,
}

/// Persistent representation of one JSON-RPC skill invocation (spec §3,
/// §4.4). Unique on `(workflow_id, agent_role, skill_name, parameters_hash)`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: uuid::Uuid,
    pub workflow_id: uuid::Uuid,
    pub agent_role: String,
    pub skill_name: String,
    pub parameters: Value,
    pub parameters_hash: String,
    pub status: TaskStatusDb,
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub correlation_id: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workflow_status", rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Partial,
}

/// One monitoring cycle (spec §3, §4.6).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Workflow {
    pub id: uuid::Uuid,
    #[sqlx(rename = "workflow_type")]
    pub r#type: String,
    pub status: WorkflowStatus,
    pub config: Value,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub current_stage: String,
    pub checkpoint: Value,
    pub metrics: Value,
}

/// Registry-mirror row per agent role, updated on every heartbeat
/// (spec §3).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_role: String,
    pub status: String,
    pub current_task_id: Option<uuid::Uuid>,
    pub heartbeat_at: DateTime<Utc>,
    pub capabilities: Value,
}

/// Content-hash table blocking re-summarisation of identical content
/// across cycles (spec §3, §4.4).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContentDedup {
    pub content_hash: String,
    pub summary_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A distributed exclusive lock (spec §3, §4.4).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lock {
    pub lock_name: String,
    pub holder_token: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
