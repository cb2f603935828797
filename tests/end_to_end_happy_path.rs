//! Scenario 1 from spec §8: one workflow over topic "X", 10 posts in, 4
//! relevant, 4 summaries, 1 alert batch delivered over both channels.
//!
//! Needs a live Postgres reachable at `DATABASE_URL`; run manually against
//! a disposable database. `cargo test -- --ignored` after `sqlx migrate run`.

use chrono::Utc;
use serde_json::json;
use store::content_store::ContentStore;
use store::dedup_store::DedupStore;
use store::models::{AlertBatchStatus, ContentVariant, Post, WorkflowStatus};
use store::workflow_store::WorkflowStore;
use store::{alert_store::AlertStore, pool};

#[tokio::test]
#[ignore = "requires a live Postgres at DATABASE_URL"]
async fn happy_path_cycle_completes_with_full_delivery() {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let db = pool::connect(&database_url).await.unwrap();
    pool::migrate(&db).await.unwrap();

    let workflows = WorkflowStore::new(db.clone());
    let content = ContentStore::new(db.clone());
    let dedup = DedupStore::new(db.clone());
    let alerts = AlertStore::new(db.clone());

    let workflow = workflows.create(json!({"topics": ["X"]})).await.unwrap();

    let mut relevant_filter_ids = Vec::new();
    for i in 0..10 {
        let post = content
            .upsert_post(&Post {
                id: 0,
                external_id: format!("t3_happy_{i}"),
                community: "rust".into(),
                title: format!("post {i} about X"),
                body: "X is great".into(),
                author: "tester".into(),
                score: 1,
                url: String::new(),
                created_at: Utc::now(),
                fetched_at: Utc::now(),
            })
            .await
            .unwrap();

        let is_relevant = i < 4;
        let combined = if is_relevant { 0.9 } else { 0.2 };
        let record = content
            .insert_filter_record(ContentVariant::Post, post.id, "X", combined, combined, combined, is_relevant)
            .await
            .unwrap();
        if is_relevant {
            relevant_filter_ids.push(record.id);
        }
    }
    workflows.checkpoint(workflow.id, "filtering", &[], &[]).await.unwrap();
    assert_eq!(relevant_filter_ids.len(), 4);

    let mut summary_ids = Vec::new();
    for (n, filter_id) in relevant_filter_ids.iter().enumerate() {
        let normalised = kernel::idempotency::normalise_text(&format!("summary body {n}"));
        let content_hash = kernel::idempotency::content_hash(&normalised);
        let summary = dedup
            .record(*filter_id, &format!("summary {n}"), "extractive", 0.5, Some("neutral"), 0.8, &content_hash)
            .await
            .unwrap();
        summary_ids.push(summary.id);
    }
    workflows.checkpoint(workflow.id, "summarising", &[], &[]).await.unwrap();
    assert_eq!(summary_ids.len(), 4);

    let batch = alerts.create_batch(0, "cycle").await.unwrap();
    for id in &summary_ids {
        alerts.add_item(batch.id, *id).await.unwrap();
    }
    alerts.record_delivery(batch.id, "slack", "sent", None).await.unwrap();
    alerts.record_delivery(batch.id, "email", "sent", None).await.unwrap();
    alerts.set_status(batch.id, AlertBatchStatus::Sent).await.unwrap();
    workflows.checkpoint(workflow.id, "alerting", &[], &[]).await.unwrap();

    let now = Utc::now();
    workflows
        .finish(workflow.id, WorkflowStatus::Completed, now, now + chrono::Duration::hours(1))
        .await
        .unwrap();

    let final_workflow = workflows.get(workflow.id).await.unwrap();
    assert_eq!(final_workflow.status, WorkflowStatus::Completed);
    assert_eq!(final_workflow.current_stage, "alerting");

    let items = alerts.items_for_batch(batch.id).await.unwrap();
    assert_eq!(items.len(), 4);
    let deliveries = alerts.deliveries_for_batch(batch.id).await.unwrap();
    assert_eq!(deliveries.iter().filter(|d| d.status == "sent").count(), 2);
}
