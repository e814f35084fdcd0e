//! Document-retrieval adapter.
//!
//! Queries a semantic index for the k most similar passages and, when any
//! are found, returns their concatenation under a fixed explanatory
//! prefix. Index internals (embeddings, vector store) live behind the
//! `DocumentIndex` seam; the in-memory keyword index here is the default
//! used for tests and local runs.

use async_trait::async_trait;

use super::Responder;
use crate::error::StageError;

/// Prefix prepended to every retrieval reply.
const REPLY_PREFIX: &str = "Here's what I found in the docs:";

/// A retrieved passage with its relevance score.
#[derive(Debug, Clone)]
pub struct Passage {
    pub content: String,
    pub score: f32,
}

/// Pre-built semantic index the adapter queries.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// The `k` most similar passages, best first. May be empty.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, StageError>;
}

pub struct RetrievalResponder {
    index: std::sync::Arc<dyn DocumentIndex>,
    k: usize,
}

impl RetrievalResponder {
    pub fn new(index: std::sync::Arc<dyn DocumentIndex>, k: usize) -> Self {
        Self { index, k }
    }
}

#[async_trait]
impl Responder for RetrievalResponder {
    fn name(&self) -> &str {
        "retrieval"
    }

    async fn respond(&self, text: &str, _user_id: &str) -> Result<Option<String>, StageError> {
        let passages = self.index.search(text, self.k).await?;
        if passages.is_empty() {
            return Ok(None);
        }
        let combined = passages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Some(format!("{REPLY_PREFIX}\n{combined}")))
    }
}

/// Keyword-overlap index over a fixed set of documents.
///
/// Scores each document by the fraction of query words it contains;
/// zero-overlap documents never match.
#[derive(Default)]
pub struct InMemoryIndex {
    documents: Vec<String>,
}

impl InMemoryIndex {
    pub fn new(documents: Vec<String>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl DocumentIndex for InMemoryIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, StageError> {
        let query_words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect();
        if query_words.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<Passage> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let doc_lower = doc.to_lowercase();
                let hits = query_words
                    .iter()
                    .filter(|w| doc_lower.contains(w.as_str()))
                    .count();
                (hits > 0).then(|| Passage {
                    content: doc.clone(),
                    score: hits as f32 / query_words.len() as f32,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn index() -> Arc<InMemoryIndex> {
        Arc::new(InMemoryIndex::new(vec![
            "Billing runs on the first of every month.".into(),
            "Support hours are 9 to 5 on weekdays.".into(),
            "Password resets require a verified email.".into(),
        ]))
    }

    #[tokio::test]
    async fn reply_carries_prefix_and_passages() {
        let responder = RetrievalResponder::new(index(), 3);
        let reply = responder
            .respond("when does billing run", "u1")
            .await
            .unwrap()
            .expect("should find the billing doc");
        assert!(reply.starts_with(REPLY_PREFIX));
        assert!(reply.contains("Billing runs"));
    }

    #[tokio::test]
    async fn no_match_is_absent() {
        let responder = RetrievalResponder::new(index(), 3);
        let reply = responder.respond("zebra migration", "u1").await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn respects_k() {
        let docs: Vec<String> = (0..10).map(|i| format!("billing doc {i}")).collect();
        let idx = Arc::new(InMemoryIndex::new(docs));
        let passages = idx.search("billing", 3).await.unwrap();
        assert_eq!(passages.len(), 3);
    }

    #[tokio::test]
    async fn best_match_ranks_first() {
        let idx = InMemoryIndex::new(vec![
            "password".into(),
            "password reset email".into(),
        ]);
        let passages = idx.search("password reset", 2).await.unwrap();
        assert_eq!(passages[0].content, "password reset email");
    }

    #[tokio::test]
    async fn empty_query_is_absent() {
        let responder = RetrievalResponder::new(index(), 3);
        assert!(responder.respond("  ", "u1").await.unwrap().is_none());
    }
}
