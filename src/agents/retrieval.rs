//! Retrieval agent skills: `fetch_posts`, `fetch_comments`,
//! `discover_communities` (spec §4.7). Rate-limited against the upstream
//! platform with a token bucket (spec §6: default 100 req/min).

use crate::collaborators::content_source::{ContentSource, TimeRange};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use kernel::error::ErrorKind;
use kernel::retry::with_retry;
use kernel::skill::Skill;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use store::content_store::ContentStore;
use store::models::{Comment, Post};

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

fn parse_time_range(value: Option<&str>) -> TimeRange {
    match value.unwrap_or("day") {
        "hour" => TimeRange::Hour,
        "week" => TimeRange::Week,
        "month" => TimeRange::Month,
        "year" => TimeRange::Year,
        _ => TimeRange::Day,
    }
}

pub struct FetchPostsSkill {
    pub source: Arc<dyn ContentSource>,
    pub content_store: ContentStore,
    pub retry: kernel::config::RetryConfig,
    pub limiter: Arc<DirectRateLimiter>,
}

impl FetchPostsSkill {
    pub fn new(source: Arc<dyn ContentSource>, content_store: ContentStore, retry: kernel::config::RetryConfig) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(100).unwrap());
        Self {
            source,
            content_store,
            retry,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl Skill for FetchPostsSkill {
    fn name(&self) -> &str {
        "fetch_posts"
    }

    async fn call(&self, params: Value) -> Result<Value, ErrorKind> {
        let topic = params
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| ErrorKind::InvalidParams("missing `topic`".into()))?
            .to_string();
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(25).min(100) as u32;
        let range = parse_time_range(params.get("time_range").and_then(Value::as_str));
        let cursor = params.get("cursor").and_then(Value::as_str).map(str::to_string);

        // Honors the platform rate limit by returning empty results rather
        // than raising once the bucket is exhausted within this call.
        if self.limiter.check().is_err() {
            return Ok(json!({"posts": [], "next_cursor": cursor}));
        }

        let source = self.source.clone();
        let topic_for_call = topic.clone();
        let cursor_for_call = cursor.clone();
        let result = with_retry(&self.retry, || {
            let source = source.clone();
            let topic = topic_for_call.clone();
            let cursor = cursor_for_call.clone();
            async move { source.fetch_posts(&topic, limit, range, cursor.as_deref()).await }
        })
        .await;

        let (posts, next_cursor) = match result {
            Ok(v) => v,
            Err(ErrorKind::Exhausted(_)) => (Vec::new(), None),
            Err(other) => return Err(other),
        };

        let mut stored = Vec::with_capacity(posts.len());
        for raw in &posts {
            let post = Post {
                id: 0,
                external_id: raw.id.clone(),
                community: raw.community.clone(),
                title: raw.title.clone(),
                body: raw.body.clone(),
                author: raw.author.clone(),
                score: raw.score,
                url: raw.url.clone(),
                created_at: raw.created_at,
                fetched_at: raw.created_at,
            };
            let saved = self
                .content_store
                .upsert_post(&post)
                .await
                .map_err(ErrorKind::from)?;
            self.content_store
                .backfill_orphaned_comments(&saved.external_id)
                .await
                .map_err(ErrorKind::from)?;
            stored.push(json!({
                "id": saved.external_id,
                "item_id": saved.id,
                "title": saved.title,
                "body": saved.body,
                "author": saved.author,
                "community": saved.community,
                "score": saved.score,
                "created_at": saved.created_at,
                "url": saved.url,
            }));
        }

        Ok(json!({"posts": stored, "next_cursor": next_cursor}))
    }
}

pub struct FetchCommentsSkill {
    pub source: Arc<dyn ContentSource>,
    pub content_store: ContentStore,
    pub retry: kernel::config::RetryConfig,
}

#[async_trait]
impl Skill for FetchCommentsSkill {
    fn name(&self) -> &str {
        "fetch_comments"
    }

    async fn call(&self, params: Value) -> Result<Value, ErrorKind> {
        let post_id = params
            .get("post_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ErrorKind::InvalidParams("missing `post_id`".into()))?
            .to_string();
        let max_depth = params.get("max_depth").and_then(Value::as_u64).unwrap_or(5).min(10) as u32;

        let source = self.source.clone();
        let post_id_for_call = post_id.clone();
        let comments = with_retry(&self.retry, || {
            let source = source.clone();
            let post_id = post_id_for_call.clone();
            async move { source.fetch_comments(&post_id, max_depth).await }
        })
        .await?;

        let mut stored = Vec::with_capacity(comments.len());
        for raw in &comments {
            let comment = Comment {
                id: 0,
                external_id: raw.id.clone(),
                external_post_id: raw.post_id.clone(),
                internal_post_id: None,
                parent_ref: raw.parent_ref.clone(),
                body: raw.body.clone(),
                author: raw.author.clone(),
                score: raw.score,
                created_at: raw.created_at,
                fetched_at: raw.created_at,
            };
            let saved = self
                .content_store
                .upsert_comment(&comment)
                .await
                .map_err(ErrorKind::from)?;
            stored.push(json!({
                "id": saved.external_id,
                "item_id": saved.id,
                "post_id": saved.external_post_id,
                "parent_ref": saved.parent_ref,
                "body": saved.body,
                "author": saved.author,
                "score": saved.score,
                "created_at": saved.created_at,
            }));
        }

        Ok(json!({"comments": stored}))
    }
}

pub struct DiscoverCommunitiesSkill {
    pub source: Arc<dyn ContentSource>,
    pub content_store: ContentStore,
}

#[async_trait]
impl Skill for DiscoverCommunitiesSkill {
    fn name(&self) -> &str {
        "discover_communities"
    }

    async fn call(&self, params: Value) -> Result<Value, ErrorKind> {
        let topic = params
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| ErrorKind::InvalidParams("missing `topic`".into()))?;
        let min_subscribers = params.get("min_subscribers").and_then(Value::as_i64);

        let communities = self.source.discover_communities(topic, min_subscribers).await?;

        let mut out = Vec::with_capacity(communities.len());
        for raw in &communities {
            self.content_store
                .upsert_community(&raw.name)
                .await
                .map_err(ErrorKind::from)?;
            out.push(json!({
                "name": raw.name,
                "subscribers": raw.subscribers,
                "description": raw.description,
            }));
        }

        Ok(json!({"communities": out}))
    }
}
