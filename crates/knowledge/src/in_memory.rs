//! In-memory knowledge base — keyword-ranked passages held in a Vec.
//!
//! Good enough for a handful of documents loaded from a text file and for
//! tests. Ranking counts query-term hits per passage, normalized by passage
//! length so a long passage does not win on size alone.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use versa_core::error::RetrieverError;
use versa_core::retriever::{Passage, Retriever};

/// Words too common to say anything about relevance.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "where",
    "which", "who", "why", "with",
];

pub struct InMemoryKnowledgeBase {
    passages: Arc<RwLock<Vec<String>>>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self {
            passages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Build a knowledge base from ready-made passages.
    pub fn from_passages<I, S>(passages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let passages = passages
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .collect();
        Self {
            passages: Arc::new(RwLock::new(passages)),
        }
    }

    /// Load a UTF-8 text file; each blank-line separated paragraph becomes
    /// one passage.
    pub async fn from_text_file(path: &Path) -> Result<Self, RetrieverError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrieverError::Unavailable(format!("{}: {e}", path.display()))
        })?;

        let kb = Self::from_passages(split_paragraphs(&content));
        info!(
            file = %path.display(),
            passages = kb.passages.read().await.len(),
            "Loaded knowledge base"
        );
        Ok(kb)
    }

}

impl Default for InMemoryKnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

/// Split text into paragraphs on blank lines, trimming each.
fn split_paragraphs(content: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
}

/// Lowercase alphanumeric terms, stopwords removed.
fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn score(query_terms: &[String], passage: &str) -> f32 {
    let passage_terms = terms(passage);
    if passage_terms.is_empty() {
        return 0.0;
    }

    let hits = passage_terms
        .iter()
        .filter(|t| query_terms.contains(t))
        .count();

    hits as f32 / (passage_terms.len() as f32 / 20.0).max(1.0)
}

#[async_trait]
impl Retriever for InMemoryKnowledgeBase {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrieverError> {
        let query_terms = terms(query);
        if query_terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let passages = self.passages.read().await;
        let mut ranked: Vec<Passage> = passages
            .iter()
            .map(|text| Passage {
                score: score(&query_terms, text),
                text: text.clone(),
            })
            .filter(|p| p.score > 0.0)
            .collect();

        // Stable sort keeps document order among equal scores
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        debug!(query = %query, hits = ranked.len(), "Knowledge base search");
        Ok(ranked)
    }

    async fn count(&self) -> Result<usize, RetrieverError> {
        Ok(self.passages.read().await.len())
    }
}
