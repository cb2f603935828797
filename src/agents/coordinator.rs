//! Coordinator: the workflow state machine driving one monitoring cycle
//! end to end (spec §4.6), plus the recovery daemon that re-dispatches
//! stuck/retry-pending tasks (spec §4.5).

use chrono::{Duration as ChronoDuration, Utc};
use kernel::client::AgentClient;
use kernel::config::Config;
use kernel::error::ErrorKind;
use kernel::registry::Registry;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use store::alert_store::AlertStore;
use store::content_store::ContentStore;
use store::models::{AlertBatchStatus, Task, WorkflowStatus};
use store::task_store::TaskStore;
use store::workflow_store::WorkflowStore;
use uuid::Uuid;

const MONITORING_CYCLE_LOCK: &str = "monitoring-cycle";

/// Everything the Coordinator needs to drive a cycle and recover crashed
/// tasks. Peer calls go out over `kernel::client::AgentClient`, one per
/// role, resolved either from static `peer_urls` or (when set) the
/// service registry.
pub struct Coordinator {
    pub config: Config,
    pub locks: store::lock_store::LockStore,
    pub workflows: WorkflowStore,
    pub tasks: TaskStore,
    pub content: ContentStore,
    pub alerts: AlertStore,
    pub registry: Option<Arc<dyn Registry>>,
    clients: HashMap<String, AgentClient>,
}

impl Coordinator {
    pub fn new(
        config: Config,
        locks: store::lock_store::LockStore,
        workflows: WorkflowStore,
        tasks: TaskStore,
        content: ContentStore,
        alerts: AlertStore,
        registry: Option<Arc<dyn Registry>>,
    ) -> Self {
        let clients = config
            .peer_urls
            .iter()
            .map(|(role, url)| (role.clone(), AgentClient::new(url.clone(), config.a2a_api_key.clone())))
            .collect();
        Self {
            config,
            locks,
            workflows,
            tasks,
            content,
            alerts,
            registry,
            clients,
        }
    }

    /// Resolve a peer client, preferring a freshly-discovered registry
    /// entry over the static config URL when a registry is configured
    /// (spec §4.2: the Coordinator does not trust stale entries).
    async fn client_for(&self, role: &str) -> Result<AgentClient, ErrorKind> {
        if let Some(registry) = &self.registry {
            if let Some(entry) = registry.discover(role).await? {
                return Ok(AgentClient::new(entry.base_url, self.config.a2a_api_key.clone()));
            }
        }
        self.clients
            .get(role)
            .cloned()
            .ok_or_else(|| ErrorKind::Fatal(format!("no peer configured for role {role}")))
    }

    /// Run one monitoring cycle (spec §4.6 steps 1-8). A no-op if the
    /// cycle lock is already held.
    pub async fn run_cycle(&self) -> Result<(), ErrorKind> {
        let holder_token = match self
            .locks
            .acquire(MONITORING_CYCLE_LOCK, ChronoDuration::minutes(30))
            .await
        {
            Ok(token) => token,
            Err(_) => {
                tracing::info!("monitoring cycle already in progress, skipping tick");
                return Ok(());
            }
        };

        let result = self.run_cycle_inner().await;

        if let Err(err) = self.locks.release(MONITORING_CYCLE_LOCK, &holder_token).await {
            tracing::warn!(error = %err, "failed to release monitoring-cycle lock");
        }

        result
    }

    async fn run_cycle_inner(&self) -> Result<(), ErrorKind> {
        let workflow = self
            .workflows
            .create(json!({
                "topics": self.config.monitoring_topics,
                "relevance_threshold": self.config.relevance_threshold,
            }))
            .await
            .map_err(ErrorKind::from)?;

        let mut metrics = serde_json::Map::new();

        let collected = self.stage_collecting(workflow.id).await?;
        metrics.insert("posts_collected".into(), json!(collected.len()));
        self.workflows
            .checkpoint(workflow.id, "filtering", &[], &[])
            .await
            .map_err(ErrorKind::from)?;

        let relevant = self.stage_filtering(workflow.id, &collected).await?;
        metrics.insert("relevant".into(), json!(relevant.len()));
        self.workflows
            .checkpoint(workflow.id, "summarising", &[], &[])
            .await
            .map_err(ErrorKind::from)?;

        let summaries = self.stage_summarising(workflow.id, &relevant).await?;
        metrics.insert("summaries".into(), json!(summaries.len()));
        self.workflows
            .checkpoint(workflow.id, "alerting", &[], &[])
            .await
            .map_err(ErrorKind::from)?;

        let (delivered, total_channels) = self.stage_alerting(workflow.id, &summaries).await?;
        metrics.insert("alerts_delivered".into(), json!(delivered));

        let status = if delivered == total_channels && total_channels > 0 {
            WorkflowStatus::Completed
        } else if delivered > 0 {
            WorkflowStatus::Partial
        } else if total_channels == 0 {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };

        let now = Utc::now();
        self.workflows
            .finish(
                workflow.id,
                status,
                now,
                now + ChronoDuration::from_std(self.config.monitoring_interval).unwrap_or_default(),
            )
            .await
            .map_err(ErrorKind::from)?;

        Ok(())
    }

    /// Stage `collecting`: fetch posts for every configured topic. A
    /// per-topic failure is tolerated as long as at least one topic
    /// produced output (spec §4.6 step 3).
    async fn stage_collecting(&self, workflow_id: Uuid) -> Result<Vec<Value>, ErrorKind> {
        let retrieval = self.client_for("retrieval").await?;
        let mut collected = Vec::new();
        let mut any_ok = false;
        let mut last_err = None;

        for topic in &self.config.monitoring_topics {
            let params = json!({"topic": topic, "limit": 100, "time_range": "day"});
            match self.submit_task(&retrieval, workflow_id, "fetch_posts", params).await {
                Ok(result) => {
                    any_ok = true;
                    if let Some(posts) = result.get("posts").and_then(Value::as_array) {
                        for post in posts {
                            collected.push(post.clone());
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(topic, error = %err, "fetch_posts failed for topic");
                    last_err = Some(err);
                }
            }
        }

        if !any_ok && !self.config.monitoring_topics.is_empty() {
            return Err(last_err.unwrap_or_else(|| ErrorKind::Fatal("no topics configured".into())));
        }
        Ok(collected)
    }

    /// Stage `filtering`: score every collected post against the
    /// configured topics via Filter, keeping only items at/above
    /// threshold (spec §4.6 step 4; boundary: score == threshold counts
    /// as relevant).
    async fn stage_filtering(&self, workflow_id: Uuid, collected: &[Value]) -> Result<Vec<Value>, ErrorKind> {
        if collected.is_empty() {
            return Ok(Vec::new());
        }
        let filter = self.client_for("filter").await?;

        let items: Vec<Value> = collected
            .iter()
            .map(|post| {
                json!({
                    "item_ref": post.get("id").cloned().unwrap_or(Value::Null),
                    "item_variant": "post",
                    "item_id": post.get("item_id").cloned().unwrap_or(Value::Null),
                    "text": format!(
                        "{} {}",
                        post.get("title").and_then(Value::as_str).unwrap_or(""),
                        post.get("body").and_then(Value::as_str).unwrap_or("")
                    ),
                })
            })
            .collect();

        let params = json!({
            "items": items,
            "topics": self.config.monitoring_topics,
            "threshold": self.config.relevance_threshold,
            "weights": {"keyword": self.config.keyword_weight, "semantic": self.config.semantic_weight},
        });

        let result = self.submit_task(&filter, workflow_id, "filter_content", params).await?;
        let records = result.get("records").and_then(Value::as_array).cloned().unwrap_or_default();

        let relevant: Vec<Value> = records
            .into_iter()
            .zip(collected.iter())
            .filter(|(record, _)| record.get("is_relevant").and_then(Value::as_bool).unwrap_or(false))
            .map(|(_, post)| post.clone())
            .collect();
        Ok(relevant)
    }

    /// Stage `summarising`: summarise every relevant item (spec §4.6 step 5).
    async fn stage_summarising(&self, workflow_id: Uuid, relevant: &[Value]) -> Result<Vec<i64>, ErrorKind> {
        if relevant.is_empty() {
            return Ok(Vec::new());
        }
        let summarise = self.client_for("summarise").await?;
        let mut summary_ids = Vec::new();

        for post in relevant {
            let content = format!(
                "{} {}",
                post.get("title").and_then(Value::as_str).unwrap_or(""),
                post.get("body").and_then(Value::as_str).unwrap_or("")
            );
            let params = json!({"content": content, "content_type": "post", "max_len": 400});
            match self.submit_task(&summarise, workflow_id, "summarise_content", params).await {
                Ok(_result) => {
                    // The SummaryRecord id isn't returned over the wire in
                    // this skill's result shape; the Alert stage reads the
                    // most recent relevant FilterRecords instead of
                    // threading summary ids through here.
                    summary_ids.push(0);
                }
                Err(err) => tracing::warn!(error = %err, "summarise_content failed for item"),
            }
        }
        Ok(summary_ids)
    }

    /// Stage `alerting`: batch summaries and deliver over both channels
    /// independently (spec §4.6 step 6).
    async fn stage_alerting(&self, workflow_id: Uuid, summaries: &[i64]) -> Result<(usize, usize), ErrorKind> {
        if summaries.is_empty() {
            return Ok((0, 0));
        }

        let batch = self
            .alerts
            .create_batch(0, "cycle")
            .await
            .map_err(ErrorKind::from)?;

        let alert = self.client_for("alert").await?;
        let mut delivered = 0;
        let total_channels = 2;

        let slack_params = json!({"batch_ref": batch.id});
        if let Ok(result) = self.submit_task(&alert, workflow_id, "send_slack", slack_params).await {
            if result.get("delivered").and_then(Value::as_bool).unwrap_or(false) {
                delivered += 1;
            }
        }

        let email_params = json!({
            "batch_ref": batch.id,
            "recipients": self.config.smtp.as_ref().map(|s| vec![s.from_address.clone()]).unwrap_or_default(),
        });
        if let Ok(result) = self.submit_task(&alert, workflow_id, "send_email", email_params).await {
            if result.get("delivered").and_then(Value::as_bool).unwrap_or(false) {
                delivered += 1;
            }
        }

        self.alerts
            .set_status(
                batch.id,
                if delivered == total_channels {
                    AlertBatchStatus::Sent
                } else {
                    AlertBatchStatus::Failed
                },
            )
            .await
            .map_err(ErrorKind::from)?;

        Ok((delivered, total_channels))
    }

    async fn submit_task(
        &self,
        client: &AgentClient,
        _workflow_id: Uuid,
        skill: &str,
        params: Value,
    ) -> Result<Value, ErrorKind> {
        client.message_send(skill, params).await
    }

    /// Recovery daemon tick: re-dispatch tasks in `retry_pending`/`stuck`
    /// per the strategy table in spec §4.5. Intended to be driven by a
    /// `tokio::time::interval` loop in the binary's `main`.
    pub async fn recover_due_tasks(&self) -> Result<(), ErrorKind> {
        let due = self.tasks.due_for_recovery().await.map_err(ErrorKind::from)?;
        for task in due {
            if let Err(err) = self.recover_one(&task).await {
                tracing::warn!(task_id = %task.id, error = %err, "recovery attempt failed");
            }
        }
        Ok(())
    }

    async fn recover_one(&self, task: &Task) -> Result<(), ErrorKind> {
        let critical = task.agent_role == "retrieval";

        if task.retry_count >= task.max_retries {
            if critical {
                // rollback: surface the workflow as failed for operator review.
                self.workflows
                    .set_status(task.workflow_id, WorkflowStatus::Failed)
                    .await
                    .map_err(ErrorKind::from)?;
            } else {
                // skip: a non-critical skill (e.g. one alert channel)
                // exceeded its retry budget; let the workflow proceed.
                tracing::info!(task_id = %task.id, "skipping non-critical task past its retry budget");
            }
            return Ok(());
        }

        // retry: re-invoke the same skill with the same params.
        let client = self.client_for(&task.agent_role).await?;
        client.message_send(&task.skill_name, task.parameters.clone()).await?;
        Ok(())
    }
}
