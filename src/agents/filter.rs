//! Filter agent: `filter_content` (spec §4.7). Combines a keyword score
//! (case-insensitive match count normalised by token count) with a
//! semantic score (cosine similarity via an `Embedder`, topic embeddings
//! cached read-mostly) into a weighted relevance verdict.

use crate::collaborators::embedder::Embedder;
use async_trait::async_trait;
use kernel::error::ErrorKind;
use kernel::skill::Skill;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use store::content_store::ContentStore;
use store::models::ContentVariant;

#[derive(Deserialize)]
struct FilterItem {
    item_ref: String,
    item_variant: String,
    item_id: i64,
    text: String,
}

#[derive(Deserialize, Default)]
struct Weights {
    keyword: Option<f64>,
    semantic: Option<f64>,
}

#[derive(Deserialize)]
struct FilterParams {
    items: Vec<FilterItem>,
    topics: Vec<String>,
    threshold: Option<f64>,
    #[serde(default)]
    weights: Weights,
}

fn keyword_score(text: &str, topics: &[String]) -> f64 {
    let tokens: Vec<String> = text.split_whitespace().map(|t| t.to_lowercase()).collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let topic_words: Vec<String> = topics.iter().map(|t| t.to_lowercase()).collect();
    let matches = tokens.iter().filter(|t| topic_words.contains(t)).count();
    (matches as f64 / tokens.len() as f64).min(1.0)
}

fn parse_variant(raw: &str) -> Result<ContentVariant, ErrorKind> {
    match raw {
        "post" => Ok(ContentVariant::Post),
        "comment" => Ok(ContentVariant::Comment),
        other => Err(ErrorKind::InvalidParams(format!("unknown item_variant: {other}"))),
    }
}

pub struct FilterContentSkill {
    pub embedder: Arc<dyn Embedder>,
    pub content_store: ContentStore,
    pub topic_cache: Cache<String, Vec<f32>>,
    pub keyword_weight: f64,
    pub semantic_weight: f64,
    pub relevance_threshold: f64,
}

impl FilterContentSkill {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        content_store: ContentStore,
        keyword_weight: f64,
        semantic_weight: f64,
        relevance_threshold: f64,
    ) -> Self {
        Self {
            embedder,
            content_store,
            topic_cache: Cache::builder().time_to_live(Duration::from_secs(3600)).build(),
            keyword_weight,
            semantic_weight,
            relevance_threshold,
        }
    }

    async fn topic_embedding(&self, topic: &str) -> Result<Vec<f32>, ErrorKind> {
        if let Some(cached) = self.topic_cache.get(topic).await {
            return Ok(cached);
        }
        let encoded = self.embedder.encode(std::slice::from_ref(&topic.to_string())).await?;
        let vector = encoded.into_iter().next().unwrap_or_default();
        self.topic_cache.insert(topic.to_string(), vector.clone()).await;
        Ok(vector)
    }
}

#[async_trait]
impl Skill for FilterContentSkill {
    fn name(&self) -> &str {
        "filter_content"
    }

    async fn call(&self, params: Value) -> Result<Value, ErrorKind> {
        let params: FilterParams =
            serde_json::from_value(params).map_err(|e| ErrorKind::InvalidParams(e.to_string()))?;
        let threshold = params.threshold.unwrap_or(self.relevance_threshold);
        let keyword_weight = params.weights.keyword.unwrap_or(self.keyword_weight);
        let semantic_weight = params.weights.semantic.unwrap_or(self.semantic_weight);

        let mut records = Vec::with_capacity(params.items.len());
        for item in &params.items {
            let variant = parse_variant(&item.item_variant)?;
            let kw = keyword_score(&item.text, &params.topics);

            let item_vector = self
                .embedder
                .encode(std::slice::from_ref(&item.text))
                .await?
                .into_iter()
                .next()
                .unwrap_or_default();

            let mut best_topic = "";
            let mut best_semantic = 0.0f32;
            for topic in &params.topics {
                let topic_vector = self.topic_embedding(topic).await?;
                let score = self.embedder.similarity(&item_vector, &topic_vector);
                if score > best_semantic {
                    best_semantic = score;
                    best_topic = topic;
                }
            }

            let combined = keyword_weight * kw + semantic_weight * best_semantic as f64;
            let is_relevant = combined >= threshold;

            self.content_store
                .insert_filter_record(
                    variant,
                    item.item_id,
                    if best_topic.is_empty() {
                        params.topics.first().map(String::as_str).unwrap_or("")
                    } else {
                        best_topic
                    },
                    kw,
                    best_semantic as f64,
                    combined,
                    is_relevant,
                )
                .await
                .map_err(ErrorKind::from)?;

            records.push(json!({
                "item_ref": item.item_ref,
                "keyword_score": kw,
                "semantic_score": best_semantic,
                "combined_score": combined,
                "is_relevant": is_relevant,
            }));
        }

        Ok(json!({"records": records}))
    }
}
