//! Scenario 2 from spec §8: `message/send` twice with identical params
//! yields the same task id and exactly one handler invocation's worth of
//! persisted state.
//!
//! Needs a live Postgres reachable at `DATABASE_URL`.

use kernel::idempotency::parameters_hash;
use serde_json::json;
use store::{pool, task_store::TaskStore, workflow_store::WorkflowStore};

#[tokio::test]
#[ignore = "requires a live Postgres at DATABASE_URL"]
async fn resubmitting_identical_params_returns_the_same_task() {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let db = pool::connect(&database_url).await.unwrap();
    pool::migrate(&db).await.unwrap();

    let workflows = WorkflowStore::new(db.clone());
    let tasks = TaskStore::new(db.clone());

    let workflow = workflows.create(json!({})).await.unwrap();
    let params = json!({"topic": "X", "limit": 10, "cursor": "abc"});
    let hash = parameters_hash(&params);

    let first = tasks
        .submit(workflow.id, "retrieval", "fetch_posts", &params, &hash, "corr-1", 3)
        .await
        .unwrap();

    let second = tasks
        .submit(workflow.id, "retrieval", "fetch_posts", &params, &hash, "corr-2", 3)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);

    let found = tasks.find(workflow.id, "retrieval", "fetch_posts", &hash).await.unwrap();
    assert_eq!(found.map(|t| t.id), Some(first.id));
}
