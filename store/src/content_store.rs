//! Content persistence: Posts, Comments, Communities, FilterRecords
//! (spec §3). Owned by Retrieval (posts/comments/communities) and Filter
//! (filter records) respectively.

use crate::error::StoreError;
use crate::models::{Comment, Community, ContentVariant, FilterRecord, Post};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Clone)]
pub struct ContentStore {
    pool: PgPool,
}

impl ContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a post, or return the existing row if `external_id` is
    /// already known (spec §3: `external_id` unique per variant, Retrieval
    /// never mutates ContentItem after creation except for score backfill).
    pub async fn upsert_post(&self, post: &Post) -> Result<Post, StoreError> {
        let row = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (external_id, community, title, body, author, score, url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (external_id) DO UPDATE SET score = EXCLUDED.score
            RETURNING *
            "#,
        )
        .bind(&post.external_id)
        .bind(&post.community)
        .bind(&post.title)
        .bind(&post.body)
        .bind(&post.author)
        .bind(post.score)
        .bind(&post.url)
        .bind(post.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_comment(&self, comment: &Comment) -> Result<Comment, StoreError> {
        let internal_post_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM posts WHERE external_id = $1")
                .bind(&comment.external_post_id)
                .fetch_optional(&self.pool)
                .await?;

        let row = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments
                (external_id, external_post_id, internal_post_id, parent_ref, body, author, score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (external_id) DO UPDATE SET score = EXCLUDED.score, internal_post_id = EXCLUDED.internal_post_id
            RETURNING *
            "#,
        )
        .bind(&comment.external_id)
        .bind(&comment.external_post_id)
        .bind(internal_post_id)
        .bind(&comment.parent_ref)
        .bind(&comment.body)
        .bind(&comment.author)
        .bind(comment.score)
        .bind(comment.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_community(&self, name: &str) -> Result<Community, StoreError> {
        let row = sqlx::query_as::<_, Community>(
            r#"
            INSERT INTO communities (name, is_active, discovered_at)
            VALUES ($1, TRUE, now())
            ON CONFLICT (name) DO UPDATE SET last_checked_at = now()
            RETURNING *
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Backfill any comments whose post arrived after them (spec §3:
    /// `internal_post_id` is nullable and set asynchronously).
    pub async fn backfill_orphaned_comments(&self, post_external_id: &str) -> Result<u64, StoreError> {
        let internal_post_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM posts WHERE external_id = $1")
                .bind(post_external_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(internal_post_id) = internal_post_id else {
            return Ok(0);
        };
        let result = sqlx::query(
            "UPDATE comments SET internal_post_id = $2 WHERE external_post_id = $1 AND internal_post_id IS NULL",
        )
        .bind(post_external_id)
        .bind(internal_post_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Record a Filter verdict. Enforces the 1-1 invariant between a
    /// ContentItem and its verdict via the `(item_variant, item_id)`
    /// unique constraint.
    pub async fn insert_filter_record(
        &self,
        item_variant: ContentVariant,
        item_id: i64,
        topic: &str,
        keyword_score: f64,
        semantic_score: f64,
        combined_score: f64,
        is_relevant: bool,
    ) -> Result<FilterRecord, StoreError> {
        let row = sqlx::query_as::<_, FilterRecord>(
            r#"
            INSERT INTO filter_records
                (item_variant, item_id, topic, keyword_score, semantic_score, combined_score, is_relevant)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(item_variant)
        .bind(item_id)
        .bind(topic)
        .bind(keyword_score)
        .bind(semantic_score)
        .bind(combined_score)
        .bind(is_relevant)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn relevant_filter_records_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<FilterRecord>, StoreError> {
        let rows = sqlx::query_as::<_, FilterRecord>(
            "SELECT * FROM filter_records WHERE is_relevant = TRUE AND created_at >= $1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
