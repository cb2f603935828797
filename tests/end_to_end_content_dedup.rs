//! Scenario 5 from spec §8: two posts with byte-identical text after
//! normalisation hash to the same `content_hash`; the second lookup hits
//! the first's SummaryRecord instead of creating a new one.
//!
//! Needs a live Postgres reachable at `DATABASE_URL`.

use kernel::idempotency::{content_hash, normalise_text};
use serde_json::json;
use store::{
    content_store::ContentStore,
    dedup_store::DedupStore,
    models::ContentVariant,
    pool,
};

#[tokio::test]
#[ignore = "requires a live Postgres at DATABASE_URL"]
async fn identical_content_produces_one_summary_record() {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let db = pool::connect(&database_url).await.unwrap();
    pool::migrate(&db).await.unwrap();

    let content = ContentStore::new(db.clone());
    let dedup = DedupStore::new(db.clone());

    let raw_a = "Rust    async runtime panics under load\n";
    let raw_b = "rust async runtime panics under load";
    let hash_a = content_hash(&normalise_text(raw_a));
    let hash_b = content_hash(&normalise_text(raw_b));
    assert_eq!(hash_a, hash_b, "normalisation must make the two texts hash identically");

    let filter_one = content
        .insert_filter_record(ContentVariant::Post, 1, "X", 0.9, 0.9, 0.9, true)
        .await
        .unwrap();
    let filter_two = content
        .insert_filter_record(ContentVariant::Post, 2, "X", 0.9, 0.9, 0.9, true)
        .await
        .unwrap();

    assert!(dedup.lookup(&hash_a).await.unwrap().is_none());

    let summary = dedup
        .record(filter_one.id, raw_a, "extractive", 0.4, None, 0.7, &hash_a)
        .await
        .unwrap();

    // Summarise would consult `lookup` for filter_two's post before calling
    // the summariser; it hits here instead of calling `record` again.
    let hit = dedup.lookup(&hash_b).await.unwrap().expect("identical content must hit the first summary");
    assert_eq!(hit.id, summary.id);
    assert_eq!(hit.filter_id, filter_one.id);
    assert_ne!(filter_two.id, filter_one.id);
}
