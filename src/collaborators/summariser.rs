//! `Summariser`: condense relevant content into an alert-ready blurb
//! (spec §6). Out of scope per spec.md §1 ("the LLM/summarisation model
//! itself"); what ships here is the trait, a keyword-ranked extractive
//! fallback, and an HTTP stand-in for a real LLM endpoint.

use async_trait::async_trait;
use kernel::error::ErrorKind;

#[async_trait]
pub trait Summariser: Send + Sync {
    /// Produce a summary no longer than `max_len` characters. Implementations
    /// return `ErrorKind::Transient` for rate limits/timeouts so callers can
    /// retry or fall back to `ExtractiveSummariser`.
    async fn summarise(&self, text: &str, max_len: usize) -> Result<String, ErrorKind>;
}

/// Ranks sentences by keyword frequency (no external model) and keeps the
/// top-scoring ones in original order until `max_len` is reached. Used both
/// as a standalone collaborator and as the Summarise agent's last-resort
/// fallback when an LLM-backed `Summariser` is unavailable or exhausted.
pub struct ExtractiveSummariser;

impl ExtractiveSummariser {
    fn split_sentences(text: &str) -> Vec<&str> {
        text.split(['.', '!', '?'])
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn score(sentence: &str, term_freq: &std::collections::HashMap<String, usize>) -> usize {
        sentence
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .map(|w| term_freq.get(&w).copied().unwrap_or(0))
            .sum()
    }
}

#[async_trait]
impl Summariser for ExtractiveSummariser {
    async fn summarise(&self, text: &str, max_len: usize) -> Result<String, ErrorKind> {
        let sentences = Self::split_sentences(text);
        if sentences.is_empty() {
            return Ok(String::new());
        }

        let mut term_freq = std::collections::HashMap::new();
        for word in text.split_whitespace() {
            *term_freq.entry(word.to_lowercase()).or_insert(0usize) += 1;
        }

        let mut ranked: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| (i, Self::score(s, &term_freq)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let mut chosen: Vec<usize> = Vec::new();
        let mut len = 0usize;
        for (idx, _) in ranked {
            let candidate_len = sentences[idx].len() + 2;
            if len + candidate_len > max_len && !chosen.is_empty() {
                continue;
            }
            chosen.push(idx);
            len += candidate_len;
            if len >= max_len {
                break;
            }
        }
        chosen.sort();

        let mut summary = chosen
            .into_iter()
            .map(|i| sentences[i])
            .collect::<Vec<_>>()
            .join(". ");
        if summary.len() > max_len {
            summary.truncate(max_len);
        }
        Ok(summary)
    }
}

/// Stands in for a hosted LLM summarisation endpoint, reusing the pooled
/// client from `kernel::client`.
pub struct HttpSummariser {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSummariser {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: kernel::client::get_http_client(&base_url),
            base_url,
        }
    }
}

#[async_trait]
impl Summariser for HttpSummariser {
    async fn summarise(&self, text: &str, max_len: usize) -> Result<String, ErrorKind> {
        #[derive(serde::Serialize)]
        struct Request<'a> {
            text: &'a str,
            max_len: usize,
        }
        #[derive(serde::Deserialize)]
        struct Response {
            summary: String,
        }

        let response = self
            .client
            .post(format!("{}/summarise", self.base_url))
            .json(&Request { text, max_len })
            .send()
            .await
            .map_err(|e| ErrorKind::Transient(format!("summarise: {e}")))?;

        if response.status() == 429 {
            return Err(ErrorKind::Exhausted("summarise: quota exceeded".into()));
        }
        if response.status().is_server_error() {
            return Err(ErrorKind::Transient(format!(
                "summarise: upstream responded {}",
                response.status()
            )));
        }
        let body: Response = response
            .json()
            .await
            .map_err(|e| ErrorKind::Transient(format!("summarise: decoding response: {e}")))?;
        Ok(body.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extractive_keeps_highest_scoring_sentences_within_budget() {
        let text = "Rust is fast. Rust is safe. The weather is nice today.";
        let summariser = ExtractiveSummariser;
        let summary = summariser.summarise(text, 40).await.unwrap();
        assert!(summary.len() <= 40);
        assert!(summary.contains("Rust"));
    }

    #[tokio::test]
    async fn empty_text_yields_empty_summary() {
        let summariser = ExtractiveSummariser;
        let summary = summariser.summarise("", 100).await.unwrap();
        assert!(summary.is_empty());
    }
}
