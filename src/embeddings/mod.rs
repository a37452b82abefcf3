//! Encoder capabilities consumed by recall and reranking, plus the shipped encoders.

pub mod hashing;
pub mod openai;
pub mod tokenize;

pub use hashing::{HashingEmbedder, HashingSparseEmbedder, HashingTokenEmbedder};
pub use openai::OpenAIEmbedder;

use crate::config::EmbeddingsConfig;
use crate::error::{RerankError, Result};
use crate::scoring::{SparseVector, TokenMatrix};
use async_trait::async_trait;

/// Dense text encoder used by the recall stage.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Width of every vector returned by [`Embedder::encode`].
    fn dimension(&self) -> usize;

    /// One vector per input text, in input order.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Sparse lexical encoder used by the sparse reranker.
#[async_trait]
pub trait SparseEmbedder: Send + Sync {
    /// One sorted sparse vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<SparseVector>>;
}

/// Per-token encoder used by the late-interaction reranker.
///
/// Returned matrices hold L2-normalized rows with padding and special tokens removed.
#[async_trait]
pub trait TokenEmbedder: Send + Sync {
    async fn encode_tokens(&self, texts: &[String], max_length: usize) -> Result<Vec<TokenMatrix>>;
}

/// Build the dense embedder named by `embeddings.provider`.
pub fn build_embedder(config: &EmbeddingsConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "hashing" => Ok(Box::new(HashingEmbedder::new(config.dimensions))),
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                RerankError::Config(format!(
                    "Environment variable {} not set",
                    config.api_key_env
                ))
            })?;
            Ok(Box::new(OpenAIEmbedder::new(
                api_key,
                config.api_base.clone(),
                config.model.clone(),
                config.batch_size,
                config.dimensions,
            )))
        }
        other => Err(RerankError::Config(format!(
            "Unknown embeddings provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_hashing_embedder() {
        let config = EmbeddingsConfig {
            dimensions: 32,
            ..EmbeddingsConfig::default()
        };
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), 32);
    }

    #[test]
    fn test_build_unknown_provider() {
        let config = EmbeddingsConfig {
            provider: "nope".to_string(),
            ..EmbeddingsConfig::default()
        };
        assert!(matches!(build_embedder(&config), Err(RerankError::Config(_))));
    }
}
