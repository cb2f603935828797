//! `ContentSource`: the external social-discussion platform client
//! (spec §6). Out of scope per spec.md §1 ("the specific social-platform
//! client"); what ships here is the narrow trait plus a null double and an
//! HTTP stand-in good enough to exercise the pipeline end-to-end.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kernel::error::ErrorKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub community: String,
    pub score: i32,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawComment {
    pub id: String,
    pub post_id: String,
    pub parent_ref: String,
    pub body: String,
    pub author: String,
    pub score: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommunity {
    pub name: String,
    pub subscribers: i64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// Narrow interface over the external platform (spec §6). Implementations
/// raise `Transient` for rate limits/network failures so they flow through
/// `kernel::retry`/the circuit breaker unchanged, and `Fatal` for anything
/// a retry cannot fix.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_posts(
        &self,
        topic: &str,
        limit: u32,
        range: TimeRange,
        cursor: Option<&str>,
    ) -> Result<(Vec<RawPost>, Option<String>), ErrorKind>;

    async fn fetch_comments(&self, post_id: &str, max_depth: u32) -> Result<Vec<RawComment>, ErrorKind>;

    async fn discover_communities(
        &self,
        topic: &str,
        min_subscribers: Option<i64>,
    ) -> Result<Vec<RawCommunity>, ErrorKind>;
}

/// Always returns empty results. Used in tests and as the default when no
/// real platform credentials are configured.
pub struct NullContentSource;

#[async_trait]
impl ContentSource for NullContentSource {
    async fn fetch_posts(
        &self,
        _topic: &str,
        _limit: u32,
        _range: TimeRange,
        _cursor: Option<&str>,
    ) -> Result<(Vec<RawPost>, Option<String>), ErrorKind> {
        Ok((Vec::new(), None))
    }

    async fn fetch_comments(&self, _post_id: &str, _max_depth: u32) -> Result<Vec<RawComment>, ErrorKind> {
        Ok(Vec::new())
    }

    async fn discover_communities(
        &self,
        _topic: &str,
        _min_subscribers: Option<i64>,
    ) -> Result<Vec<RawCommunity>, ErrorKind> {
        Ok(Vec::new())
    }
}

/// Talks to a configurable REST base URL standing in for the real platform
/// API, reusing the pooled client from `kernel::client`.
pub struct HttpContentSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpContentSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: kernel::client::get_http_client(&base_url),
            base_url,
        }
    }
}

fn range_str(range: TimeRange) -> &'static str {
    match range {
        TimeRange::Hour => "hour",
        TimeRange::Day => "day",
        TimeRange::Week => "week",
        TimeRange::Month => "month",
        TimeRange::Year => "year",
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch_posts(
        &self,
        topic: &str,
        limit: u32,
        range: TimeRange,
        cursor: Option<&str>,
    ) -> Result<(Vec<RawPost>, Option<String>), ErrorKind> {
        #[derive(Deserialize)]
        struct Response {
            posts: Vec<RawPost>,
            next_cursor: Option<String>,
        }

        let mut request = self
            .client
            .get(format!("{}/posts", self.base_url))
            .query(&[("topic", topic), ("limit", &limit.to_string()), ("range", range_str(range))]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ErrorKind::Transient(format!("fetch_posts: {e}")))?;
        if response.status() == 429 || response.status().is_server_error() {
            return Err(ErrorKind::Transient(format!(
                "fetch_posts: platform responded {}",
                response.status()
            )));
        }
        let body: Response = response
            .json()
            .await
            .map_err(|e| ErrorKind::Transient(format!("fetch_posts: decoding response: {e}")))?;
        Ok((body.posts, body.next_cursor))
    }

    async fn fetch_comments(&self, post_id: &str, max_depth: u32) -> Result<Vec<RawComment>, ErrorKind> {
        #[derive(Deserialize)]
        struct Response {
            comments: Vec<RawComment>,
        }

        let response = self
            .client
            .get(format!("{}/posts/{post_id}/comments", self.base_url))
            .query(&[("max_depth", max_depth)])
            .send()
            .await
            .map_err(|e| ErrorKind::Transient(format!("fetch_comments: {e}")))?;
        let body: Response = response
            .json()
            .await
            .map_err(|e| ErrorKind::Transient(format!("fetch_comments: decoding response: {e}")))?;
        Ok(body.comments)
    }

    async fn discover_communities(
        &self,
        topic: &str,
        min_subscribers: Option<i64>,
    ) -> Result<Vec<RawCommunity>, ErrorKind> {
        #[derive(Deserialize)]
        struct Response {
            communities: Vec<RawCommunity>,
        }

        let mut request = self
            .client
            .get(format!("{}/communities", self.base_url))
            .query(&[("topic", topic)]);
        if let Some(min) = min_subscribers {
            request = request.query(&[("min_subscribers", min)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ErrorKind::Transient(format!("discover_communities: {e}")))?;
        let body: Response = response
            .json()
            .await
            .map_err(|e| ErrorKind::Transient(format!("discover_communities: decoding response: {e}")))?;
        Ok(body.communities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_source_returns_empty() {
        let source = NullContentSource;
        let (posts, cursor) = source
            .fetch_posts("rust", 10, TimeRange::Day, None)
            .await
            .unwrap();
        assert!(posts.is_empty());
        assert!(cursor.is_none());
    }
}
