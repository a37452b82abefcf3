//! Second-stage rerankers.
//!
//! Both variants implement [`Reranker`]: score every candidate, attach
//! `rerank_score`, and return the candidates stably sorted best-first.
//!
//! Encoding failures are handled the same way in both variants. A failed query
//! encoding fails the call. A failed document encoding is retried one document at
//! a time, and a document that still fails scores `-inf` and sorts last.

pub mod late_interaction;
pub mod sparse;

pub use late_interaction::LateInteractionReranker;
pub use sparse::SparseReranker;

use crate::config::RerankConfig;
use crate::embeddings::{HashingSparseEmbedder, HashingTokenEmbedder};
use crate::error::Result;
use crate::search::Candidate;
use async_trait::async_trait;
use std::cmp::Ordering;

/// Reorders recall candidates by a more expensive relevance score.
#[async_trait]
pub trait Reranker: Send {
    /// Short identifier used in logs and reports
    fn name(&self) -> &str;

    /// Score and reorder `candidates` for `query`.
    ///
    /// Every returned candidate carries `rerank_score`; `score` is unchanged.
    async fn rerank(&mut self, query: &str, candidates: Vec<Candidate>) -> Result<Vec<Candidate>>;
}

/// Which reranker to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RerankerKind {
    /// Keep the recall order
    None,
    /// Sparse lexical dot product
    Sparse,
    /// Token-level MaxSim
    LateInteraction,
}

impl RerankerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RerankerKind::None => "none",
            RerankerKind::Sparse => "sparse",
            RerankerKind::LateInteraction => "late-interaction",
        }
    }
}

impl std::fmt::Display for RerankerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the reranker for `kind` using the offline encoders; `None` keeps recall order.
pub fn build_reranker(kind: RerankerKind, config: &RerankConfig) -> Option<Box<dyn Reranker>> {
    match kind {
        RerankerKind::None => None,
        RerankerKind::Sparse => Some(Box::new(SparseReranker::new(
            HashingSparseEmbedder::new(),
            config.sparse_cache_capacity,
        ))),
        RerankerKind::LateInteraction => Some(Box::new(
            LateInteractionReranker::new(HashingTokenEmbedder::new(config.token_dimensions))
                .with_batch_size(config.token_batch_size)
                .with_max_lengths(config.query_max_len, config.doc_max_len),
        )),
    }
}

/// Attach `scores` (aligned with `candidates`) and stable-sort best-first.
///
/// Equal scores keep their input order. NaN compares equal to everything.
pub(crate) fn apply_scores(mut candidates: Vec<Candidate>, scores: Vec<f32>) -> Vec<Candidate> {
    debug_assert_eq!(candidates.len(), scores.len());
    for (candidate, score) in candidates.iter_mut().zip(scores) {
        candidate.rerank_score = Some(score);
    }
    candidates.sort_by(|a, b| {
        let a = a.rerank_score.unwrap_or(f32::NEG_INFINITY);
        let b = b.rerank_score.unwrap_or(f32::NEG_INFINITY);
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });
    candidates
}
