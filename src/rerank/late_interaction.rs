use crate::embeddings::TokenEmbedder;
use crate::error::{RerankError, Result};
use crate::rerank::{apply_scores, Reranker};
use crate::scoring::{maxsim, TokenMatrix};
use crate::search::Candidate;
use async_trait::async_trait;

const DEFAULT_BATCH_SIZE: usize = 8;
const DEFAULT_QUERY_MAX_LEN: usize = 64;
const DEFAULT_DOC_MAX_LEN: usize = 300;

/// Late-interaction reranker: MaxSim between query and document token matrices.
///
/// Documents are encoded in batches of `batch_size`. Batch boundaries do not
/// change scores.
pub struct LateInteractionReranker<E: TokenEmbedder> {
    embedder: E,
    batch_size: usize,
    query_max_len: usize,
    doc_max_len: usize,
}

impl<E: TokenEmbedder> LateInteractionReranker<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            query_max_len: DEFAULT_QUERY_MAX_LEN,
            doc_max_len: DEFAULT_DOC_MAX_LEN,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_lengths(mut self, query_max_len: usize, doc_max_len: usize) -> Self {
        self.query_max_len = query_max_len.max(1);
        self.doc_max_len = doc_max_len.max(1);
        self
    }

    async fn encode_query(&self, query: &str) -> Result<TokenMatrix> {
        self.embedder
            .encode_tokens(&[query.to_string()], self.query_max_len)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RerankError::Embedding("Token encoder returned no query matrix".to_string()))
    }

    /// Encode one batch; on failure retry each text alone so only the failing
    /// documents come back as `None`.
    async fn encode_batch(&self, texts: &[String]) -> Vec<Option<TokenMatrix>> {
        match self.embedder.encode_tokens(texts, self.doc_max_len).await {
            Ok(matrices) if matrices.len() == texts.len() => {
                return matrices.into_iter().map(Some).collect();
            }
            Ok(matrices) => log::warn!(
                "Token encoder returned {} matrices for {} texts; encoding individually",
                matrices.len(),
                texts.len()
            ),
            Err(e) => log::warn!("Token batch encoding failed ({}); encoding individually", e),
        }

        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let single = match self
                .embedder
                .encode_tokens(std::slice::from_ref(text), self.doc_max_len)
                .await
            {
                Ok(mut matrices) if matrices.len() == 1 => Some(matrices.remove(0)),
                Ok(_) => None,
                Err(e) => {
                    log::warn!("Token encoding failed for a document: {}", e);
                    None
                }
            };
            out.push(single);
        }
        out
    }
}

#[async_trait]
impl<E: TokenEmbedder> Reranker for LateInteractionReranker<E> {
    fn name(&self) -> &str {
        "late-interaction"
    }

    async fn rerank(&mut self, query: &str, candidates: Vec<Candidate>) -> Result<Vec<Candidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let query_tokens = self.encode_query(query).await?;

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let mut doc_tokens: Vec<Option<TokenMatrix>> = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            doc_tokens.extend(self.encode_batch(batch).await);
        }

        let mut scores = Vec::with_capacity(doc_tokens.len());
        for doc in &doc_tokens {
            let score = match doc {
                Some(doc) if doc.is_empty() || query_tokens.is_empty() => f32::NEG_INFINITY,
                Some(doc) => {
                    if doc.dim() != query_tokens.dim() {
                        return Err(RerankError::Embedding(format!(
                            "Token dimension mismatch: query {} vs document {}",
                            query_tokens.dim(),
                            doc.dim()
                        )));
                    }
                    maxsim(&query_tokens, doc)
                }
                None => f32::NEG_INFINITY,
            };
            scores.push(score);
        }

        log::debug!(
            "Late-interaction rerank: {} candidates, {} query tokens",
            candidates.len(),
            query_tokens.len()
        );

        Ok(apply_scores(candidates, scores))
    }
}
