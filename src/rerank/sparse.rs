use crate::cache::SparseVectorCache;
use crate::embeddings::SparseEmbedder;
use crate::error::{RerankError, Result};
use crate::rerank::{apply_scores, Reranker};
use crate::scoring::SparseVector;
use crate::search::Candidate;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Sparse lexical reranker: query/document sparse vectors scored by dot product.
///
/// Document vectors are memoized by exact text in an LRU cache owned by the
/// reranker, so a text seen in an earlier query is not encoded again while it
/// stays cached.
pub struct SparseReranker<E: SparseEmbedder> {
    embedder: E,
    cache: SparseVectorCache,
}

impl<E: SparseEmbedder> SparseReranker<E> {
    pub fn new(embedder: E, cache_capacity: usize) -> Self {
        Self {
            embedder,
            cache: SparseVectorCache::new(cache_capacity),
        }
    }

    pub fn cache(&self) -> &SparseVectorCache {
        &self.cache
    }

    async fn encode_query(&self, query: &str) -> Result<SparseVector> {
        self.embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RerankError::Embedding("Sparse encoder returned no query vector".to_string()))
    }

    /// Encode `texts`, isolating failures to the texts that fail on their own.
    ///
    /// A malformed vector is returned as an error rather than isolated.
    async fn encode_documents(&self, texts: &[String]) -> Result<HashMap<String, SparseVector>> {
        let mut out = HashMap::with_capacity(texts.len());
        if texts.is_empty() {
            return Ok(out);
        }

        match self.embedder.embed(texts).await {
            Ok(vectors) if vectors.len() == texts.len() => {
                out.extend(texts.iter().cloned().zip(vectors));
                return Ok(out);
            }
            Ok(vectors) => log::warn!(
                "Sparse encoder returned {} vectors for {} texts; encoding individually",
                vectors.len(),
                texts.len()
            ),
            Err(e @ RerankError::MalformedSparseVector(_)) => return Err(e),
            Err(e) => log::warn!("Sparse batch encoding failed ({}); encoding individually", e),
        }

        for text in texts {
            match self.embedder.embed(std::slice::from_ref(text)).await {
                Ok(mut vectors) if vectors.len() == 1 => {
                    out.insert(text.clone(), vectors.remove(0));
                }
                Ok(_) => log::warn!("Sparse encoder returned no vector for a document"),
                Err(e @ RerankError::MalformedSparseVector(_)) => return Err(e),
                Err(e) => log::warn!("Sparse encoding failed for a document: {}", e),
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl<E: SparseEmbedder> Reranker for SparseReranker<E> {
    fn name(&self) -> &str {
        "sparse"
    }

    async fn rerank(&mut self, query: &str, candidates: Vec<Candidate>) -> Result<Vec<Candidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let query_vec = self.encode_query(query).await?;

        let mut vectors: Vec<Option<SparseVector>> = Vec::with_capacity(candidates.len());
        let mut misses: Vec<String> = Vec::new();
        {
            let mut seen_misses: HashSet<&str> = HashSet::new();
            for candidate in &candidates {
                // repeated miss within this call: already queued
                if seen_misses.contains(candidate.text.as_str()) {
                    vectors.push(None);
                    continue;
                }
                let cached = self.cache.get(&candidate.text);
                if cached.is_none() {
                    seen_misses.insert(candidate.text.as_str());
                    misses.push(candidate.text.clone());
                }
                vectors.push(cached);
            }
        }

        let fresh = self.encode_documents(&misses).await?;
        for (text, vector) in &fresh {
            self.cache.put(text.clone(), vector.clone());
        }

        let (hits, total_misses) = self.cache.stats();
        log::debug!(
            "Sparse rerank: {} candidates, {} encoded, cache {} entries (hits={}, misses={})",
            candidates.len(),
            fresh.len(),
            self.cache.len(),
            hits,
            total_misses
        );

        let scores: Vec<f32> = candidates
            .iter()
            .zip(vectors.iter())
            .map(|(candidate, cached)| {
                match cached.as_ref().or_else(|| fresh.get(&candidate.text)) {
                    Some(doc_vec) => query_vec.dot(doc_vec),
                    None => f32::NEG_INFINITY,
                }
            })
            .collect();

        Ok(apply_scores(candidates, scores))
    }
}
