//! Scenario 6 from spec §8: Slack delivery fails permanently, SMTP
//! succeeds. The batch settles on `failed` for Slack / `sent` for email,
//! and the owning workflow settles on `partial`.
//!
//! Needs a live Postgres reachable at `DATABASE_URL`.

use chrono::Utc;
use serde_json::json;
use store::{
    alert_store::AlertStore,
    dedup_store::DedupStore,
    content_store::ContentStore,
    models::{AlertBatchStatus, ContentVariant, WorkflowStatus},
    pool,
    workflow_store::WorkflowStore,
};

#[tokio::test]
#[ignore = "requires a live Postgres at DATABASE_URL"]
async fn slack_failure_with_email_success_yields_partial_workflow() {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let db = pool::connect(&database_url).await.unwrap();
    pool::migrate(&db).await.unwrap();

    let workflows = WorkflowStore::new(db.clone());
    let content = ContentStore::new(db.clone());
    let dedup = DedupStore::new(db.clone());
    let alerts = AlertStore::new(db.clone());

    let workflow = workflows.create(json!({"topics": ["X"]})).await.unwrap();
    let filter_record = content
        .insert_filter_record(ContentVariant::Post, 1, "X", 0.9, 0.9, 0.9, true)
        .await
        .unwrap();
    let summary = dedup
        .record(filter_record.id, "partial alert scenario summary", "extractive", 0.4, None, 0.7, "partial-alert-hash")
        .await
        .unwrap();

    let batch = alerts.create_batch(0, "cycle").await.unwrap();
    alerts.add_item(batch.id, summary.id).await.unwrap();

    // Slack retried to its max and still failing (retry_count mirrors a
    // max-retries-exhausted SendSlackSkill call).
    alerts.record_delivery(batch.id, "slack", "failed", Some("webhook returned 500")).await.unwrap();
    alerts.record_delivery(batch.id, "slack", "failed", Some("webhook returned 500")).await.unwrap();
    alerts.record_delivery(batch.id, "slack", "failed", Some("webhook returned 500")).await.unwrap();
    alerts.record_delivery(batch.id, "email", "sent", None).await.unwrap();

    alerts.set_status(batch.id, AlertBatchStatus::Failed).await.unwrap();

    let deliveries = alerts.deliveries_for_batch(batch.id).await.unwrap();
    let slack = deliveries.iter().find(|d| d.channel == "slack").unwrap();
    let email = deliveries.iter().find(|d| d.channel == "email").unwrap();
    assert_eq!(slack.status, "failed");
    assert_eq!(slack.retry_count, 2);
    assert_eq!(email.status, "sent");

    let now = Utc::now();
    workflows
        .finish(workflow.id, WorkflowStatus::Partial, now, now + chrono::Duration::hours(1))
        .await
        .unwrap();
    let final_workflow = workflows.get(workflow.id).await.unwrap();
    assert_eq!(final_workflow.status, WorkflowStatus::Partial);
}
