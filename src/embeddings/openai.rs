use crate::embeddings::Embedder;
use crate::error::{RerankError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request structure for OpenAI-compatible embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response structure from OpenAI-compatible embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in API response
#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

const MAX_RETRIES: usize = 3;

/// OpenAI-compatible embeddings client
///
/// Handles batch embedding generation with retry logic and rate limiting.
/// Works against any server exposing `POST {api_base}/embeddings`.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    batch_size: usize,
    dimension: usize,
}

impl OpenAIEmbedder {
    /// Create a new embedder
    ///
    /// # Arguments
    ///
    /// * `api_key` - API key sent as a bearer token
    /// * `api_base` - Base URL, e.g. "https://api.openai.com/v1"
    /// * `model` - Model name (e.g., "text-embedding-3-small")
    /// * `batch_size` - Maximum number of texts to send per API request (max 2048)
    /// * `dimension` - Expected width of returned vectors
    ///
    /// # Panics
    ///
    /// Panics if HTTP client cannot be created (should not happen in normal operation)
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        batch_size: usize,
        dimension: usize,
    ) -> Self {
        // Validate batch size doesn't exceed OpenAI limits
        let batch_size = batch_size.clamp(1, 2048);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            batch_size,
            dimension,
        }
    }

    /// Internal method to make a single API request
    async fn embed_batch_internal(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RerankError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(RerankError::Embedding(format!(
                "Embeddings API error {}: {}",
                status, body
            )));
        }

        let mut result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RerankError::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.data.len() != texts.len() {
            return Err(RerankError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        // Servers may return items out of order; index restores input order
        result.data.sort_by_key(|d| d.index.unwrap_or(0));

        let embeddings: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(RerankError::Embedding(format!(
                "Unexpected embedding dimension: expected {}, got {}",
                self.dimension,
                bad.len()
            )));
        }
        Ok(embeddings)
    }

    /// Embed one batch, retrying rate-limit and server errors with exponential backoff
    async fn embed_batch_with_retry(&self, texts: &[String], max_retries: usize) -> Result<Vec<Vec<f32>>> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.embed_batch_internal(texts).await {
                Ok(embeddings) => {
                    log::debug!(
                        "Embedding API call for {} texts took {:?} (attempt {})",
                        texts.len(),
                        start.elapsed(),
                        attempt + 1
                    );
                    return Ok(embeddings);
                }
                Err(e) if attempt < max_retries && is_retryable(&e) => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, max_retries, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 429 rate limit or 5xx server error
fn is_retryable(e: &RerankError) -> bool {
    let msg = e.to_string();
    ["429", "500", "502", "503", "504"]
        .iter()
        .any(|code| msg.contains(code))
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.embed_batch_with_retry(chunk, MAX_RETRIES).await?;
            all_embeddings.extend(embeddings);

            // Rate limiting: small delay between full batches
            if chunk.len() == self.batch_size && all_embeddings.len() < texts.len() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }
}
