//! `Embedder`: encode text to vectors and score similarity (spec §6). The
//! real scoring model is out of scope (spec.md §1); `HashingEmbedder` is a
//! deterministic bag-of-words hashing vector good enough to exercise
//! Filter's scoring logic in tests and local runs.

use async_trait::async_trait;
use kernel::error::ErrorKind;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const EMBEDDING_DIMENSIONS: usize = 256;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ErrorKind>;
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32;
}

/// Hashes each lowercased token into one of `EMBEDDING_DIMENSIONS` buckets
/// and accumulates a count, giving a stable (if crude) bag-of-words vector
/// with no external model dependency.
pub struct HashingEmbedder;

impl HashingEmbedder {
    fn hash_token(token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % EMBEDDING_DIMENSIONS
    }

    fn encode_one(text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; EMBEDDING_DIMENSIONS];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            vector[Self::hash_token(&token)] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ErrorKind> {
        Ok(texts.iter().map(|t| Self::encode_one(t)).collect())
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        dot.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_has_similarity_one() {
        let embedder = HashingEmbedder;
        let vectors = embedder
            .encode(&["rust async runtime".to_string(), "rust async runtime".to_string()])
            .await
            .unwrap();
        let score = embedder.similarity(&vectors[0], &vectors[1]);
        assert!((score - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn disjoint_text_has_low_similarity() {
        let embedder = HashingEmbedder;
        let vectors = embedder
            .encode(&["rust async runtime".to_string(), "gardening tips for tomatoes".to_string()])
            .await
            .unwrap();
        let score = embedder.similarity(&vectors[0], &vectors[1]);
        assert!(score < 0.3);
    }
}
