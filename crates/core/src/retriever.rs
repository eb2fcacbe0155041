//! Retriever trait — the knowledge source behind document-grounded answers.
//!
//! A retriever maps a query to its top-k passages, highest relevance first.
//! How passages are indexed (keyword, embeddings, external vector store) is
//! the implementation's business; the context pipeline never re-ranks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::RetrieverError;

/// A retrieved passage. Ephemeral: recomputed per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// The passage text
    pub text: String,

    /// Relevance score assigned by the retriever (higher is better)
    #[serde(default)]
    pub score: f32,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            score: 0.0,
        }
    }
}

impl AsRef<str> for Passage {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// The core Retriever trait.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Backend name (for diagnostics).
    fn name(&self) -> &str;

    /// Return up to `k` passages for `query`, most relevant first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrieverError>;

    /// Number of passages available to this retriever.
    async fn count(&self) -> Result<usize, RetrieverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passage_as_str() {
        let passage = Passage::new("Blue whales are mammals.");
        let text: &str = passage.as_ref();
        assert_eq!(text, "Blue whales are mammals.");
        assert_eq!(passage.score, 0.0);
    }

    #[test]
    fn passage_deserializes_without_score() {
        let passage: Passage = serde_json::from_str(r#"{"text":"krill"}"#).unwrap();
        assert_eq!(passage, Passage::new("krill"));
    }
}
