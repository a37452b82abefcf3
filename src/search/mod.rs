//! Recall stage: candidate type and the vector store capability.

pub mod memory;
pub mod store;

pub use memory::{MemoryIndex, MemoryVectorStore, StoredDocument};
pub use store::SqliteVectorStore;

use crate::embeddings::Embedder;
use crate::error::{RerankError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;

/// One recall result, optionally carrying a rerank score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: String,
    pub text: String,
    /// Recall similarity
    pub score: f32,
    /// Set by a reranker; `score` is left untouched
    pub rerank_score: Option<f32>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            score,
            rerank_score: None,
        }
    }
}

/// Dense recall over an indexed collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Top `top_k` documents by similarity to `query`, best first.
    async fn retrieve(&self, query: &[f32], top_k: usize) -> Result<Vec<Candidate>>;

    /// Every document id currently held by the store.
    async fn list_document_ids(&self) -> Result<HashSet<String>>;
}

/// Dense recall for one query: embed `query`, then take the store's top `top_k`.
pub async fn recall(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    query: &str,
    top_k: usize,
) -> Result<Vec<Candidate>> {
    let query_vec = embedder
        .encode(&[query.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RerankError::Embedding("Embedder returned no query vector".to_string()))?;
    store.retrieve(&query_vec, top_k).await
}
