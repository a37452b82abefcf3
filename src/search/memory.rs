//! Exact in-memory cosine index.
//!
//! Backs [`MemoryVectorStore`] directly and [`super::SqliteVectorStore`] after
//! its one-time load from the database.

use crate::error::{RerankError, Result};
use crate::search::{Candidate, VectorStore};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;

/// A document with its dense embedding
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Flat list of documents scored by brute-force cosine similarity.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    docs: Vec<StoredDocument>,
}

impl MemoryIndex {
    pub fn new(docs: Vec<StoredDocument>) -> Self {
        Self { docs }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn push(&mut self, doc: StoredDocument) {
        self.docs.push(doc);
    }

    /// Width of the stored embeddings, if any document is held
    pub fn dimension(&self) -> Option<usize> {
        self.docs.first().map(|d| d.embedding.len())
    }

    pub fn ids(&self) -> HashSet<String> {
        self.docs.iter().map(|d| d.id.clone()).collect()
    }

    /// Score `query` against every document; return the best `limit`, sorted by score descending.
    pub fn top_k(&self, query: &[f32], limit: usize) -> Result<Vec<Candidate>> {
        if let Some(dim) = self.dimension() {
            if dim != query.len() {
                return Err(RerankError::Search(format!(
                    "Query dimension {} does not match index dimension {}",
                    query.len(),
                    dim
                )));
            }
        }

        let mut scored: Vec<(f32, usize)> = self
            .docs
            .iter()
            .enumerate()
            .map(|(i, d)| (cosine_similarity(query, &d.embedding), i))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, i)| {
                let doc = &self.docs[i];
                Candidate::new(doc.id.clone(), doc.text.clone(), score)
            })
            .collect())
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// In-memory vector store for tests and small corpora.
#[derive(Default)]
pub struct MemoryVectorStore {
    index: RwLock<MemoryIndex>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(docs: Vec<StoredDocument>) -> Self {
        Self {
            index: RwLock::new(MemoryIndex::new(docs)),
        }
    }

    pub fn insert(&self, doc: StoredDocument) {
        self.index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(doc);
    }

    pub fn len(&self) -> usize {
        self.index.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn retrieve(&self, query: &[f32], top_k: usize) -> Result<Vec<Candidate>> {
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .top_k(query, top_k)
    }

    async fn list_document_ids(&self) -> Result<HashSet<String>> {
        Ok(self.index.read().unwrap_or_else(|e| e.into_inner()).ids())
    }
}
