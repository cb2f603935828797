//! Summarise agent: `summarise_content` (spec §4.7). Content-hash dedup
//! before calling the model, recursive paragraph-boundary chunking for
//! oversized content, extractive fallback on any model failure.

use crate::collaborators::summariser::{ExtractiveSummariser, Summariser};
use async_trait::async_trait;
use kernel::error::ErrorKind;
use kernel::idempotency::{content_hash, normalise_text};
use kernel::skill::Skill;
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use store::dedup_store::DedupStore;

/// Content longer than this is chunked rather than sent whole, as a rough
/// stand-in for a model's token limit.
const MAX_CHUNK_CHARS: usize = 4000;

pub struct SummariseContentSkill {
    pub summariser: Arc<dyn Summariser>,
    pub extractive: ExtractiveSummariser,
    pub dedup: DedupStore,
}

impl SummariseContentSkill {
    fn split_at_paragraph_boundary(text: &str) -> (String, String) {
        let paragraphs: Vec<&str> = text.split("\n\n").collect();
        if paragraphs.len() < 2 {
            let mid = text.len() / 2;
            let boundary = text
                .char_indices()
                .map(|(i, _)| i)
                .find(|&i| i >= mid)
                .unwrap_or(text.len());
            return (text[..boundary].to_string(), text[boundary..].to_string());
        }
        let half = paragraphs.len() / 2;
        (paragraphs[..half].join("\n\n"), paragraphs[half..].join("\n\n"))
    }

    fn summarise_recursive<'a>(
        &'a self,
        text: String,
        max_len: usize,
    ) -> Pin<Box<dyn Future<Output = Result<(String, String), ErrorKind>> + Send + 'a>> {
        Box::pin(async move {
            if text.len() <= MAX_CHUNK_CHARS {
                return match self.summariser.summarise(&text, max_len).await {
                    Ok(summary) => Ok((summary, "llm".to_string())),
                    Err(_) => {
                        let summary = self.extractive.summarise(&text, max_len).await?;
                        Ok((summary, "extractive".to_string()))
                    }
                };
            }

            let (left, right) = Self::split_at_paragraph_boundary(&text);
            let (left_summary, _) = self.summarise_recursive(left, max_len).await?;
            let (right_summary, _) = self.summarise_recursive(right, max_len).await?;
            let combined = format!("{left_summary} {right_summary}");

            match self.summariser.summarise(&combined, max_len).await {
                Ok(summary) => Ok((summary, "llm".to_string())),
                Err(_) => {
                    let summary = self.extractive.summarise(&combined, max_len).await?;
                    Ok((summary, "extractive".to_string()))
                }
            }
        })
    }
}

#[async_trait]
impl Skill for SummariseContentSkill {
    fn name(&self) -> &str {
        "summarise_content"
    }

    async fn call(&self, params: Value) -> Result<Value, ErrorKind> {
        let content = params
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ErrorKind::InvalidParams("missing `content`".into()))?
            .to_string();
        let content_type = params
            .get("content_type")
            .and_then(Value::as_str)
            .unwrap_or("post");
        if !matches!(content_type, "post" | "comment" | "batch") {
            return Err(ErrorKind::InvalidParams(format!(
                "unknown content_type: {content_type}"
            )));
        }
        let max_len = params.get("max_len").and_then(Value::as_u64).unwrap_or(400) as usize;
        let filter_id = params.get("filter_id").and_then(Value::as_i64);

        let normalised = normalise_text(&content);
        let hash = content_hash(&normalised);

        if let Some(existing) = self.dedup.lookup(&hash).await.map_err(ErrorKind::from)? {
            return Ok(json!({
                "summary": existing.summary_text,
                "model_used": existing.model_used,
                "compression_ratio": existing.compression_ratio,
                "confidence": existing.confidence,
            }));
        }

        let (summary, model_used) = self.summarise_recursive(content.clone(), max_len).await?;
        let compression_ratio = if content.is_empty() {
            0.0
        } else {
            summary.len() as f64 / content.len() as f64
        };
        let confidence = if model_used == "llm" { 0.8 } else { 0.5 };

        if let Some(filter_id) = filter_id {
            self.dedup
                .record(filter_id, &summary, &model_used, compression_ratio, None, confidence, &hash)
                .await
                .map_err(ErrorKind::from)?;
        }

        Ok(json!({
            "summary": summary,
            "model_used": model_used,
            "compression_ratio": compression_ratio,
            "confidence": confidence,
        }))
    }
}
