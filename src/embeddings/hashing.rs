//! Deterministic offline encoders built on SHA-256 token hashing.
//!
//! These need no model files or network access. The dense and sparse encoders
//! are bag-of-words feature hashers; the token encoder assigns every distinct
//! token a fixed pseudo-random unit vector, so MaxSim reduces to soft term
//! matching. Useful for smoke runs, CI and as a lexical baseline.

use crate::embeddings::tokenize::tokenize;
use crate::embeddings::{Embedder, SparseEmbedder, TokenEmbedder};
use crate::error::Result;
use crate::scoring::{SparseVector, TokenMatrix};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

fn token_hash(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

fn hash_u32(hash: &[u8; 32]) -> u32 {
    u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]])
}

fn hash_u64(hash: &[u8; 32], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// xorshift64* stream seeded from a token hash
struct TokenRng(u64);

impl TokenRng {
    fn new(seed: u64) -> Self {
        // xorshift state must be non-zero
        Self(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed })
    }

    /// Uniform in [-1, 1)
    fn next_f32(&mut self) -> f32 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        let bits = self.0.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 40;
        (bits as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    }
}

/// Signed feature-hashing dense encoder producing L2-normalized vectors.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let h = token_hash(&token);
            let slot = (hash_u64(&h, 0) % self.dimension as u64) as usize;
            let sign = if h[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[slot] += sign;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode_one(t)).collect())
    }
}

/// Hashed term-frequency sparse encoder with `1 + ln(tf)` weights.
#[derive(Default)]
pub struct HashingSparseEmbedder;

impl HashingSparseEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn embed_one(&self, text: &str) -> SparseVector {
        let mut tf: HashMap<u32, u32> = HashMap::new();
        for token in tokenize(text) {
            *tf.entry(hash_u32(&token_hash(&token))).or_insert(0) += 1;
        }
        SparseVector::from_pairs(
            tf.into_iter()
                .map(|(idx, count)| (idx, 1.0 + (count as f32).ln()))
                .collect(),
        )
    }
}

#[async_trait]
impl SparseEmbedder for HashingSparseEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<SparseVector>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// One fixed pseudo-random unit vector per token.
pub struct HashingTokenEmbedder {
    dimension: usize,
}

impl HashingTokenEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn token_vector(&self, token: &str) -> Vec<f32> {
        let h = token_hash(token);
        let mut rng = TokenRng::new(hash_u64(&h, 0) ^ hash_u64(&h, 8));
        let mut v: Vec<f32> = (0..self.dimension).map(|_| rng.next_f32()).collect();
        l2_normalize(&mut v);
        v
    }

    fn encode_one(&self, text: &str, max_length: usize) -> TokenMatrix {
        let mut data = Vec::new();
        for token in tokenize(text).into_iter().take(max_length) {
            data.extend(self.token_vector(&token));
        }
        TokenMatrix::new(self.dimension, data).unwrap_or_else(|_| TokenMatrix::empty(self.dimension))
    }
}

#[async_trait]
impl TokenEmbedder for HashingTokenEmbedder {
    async fn encode_tokens(&self, texts: &[String], max_length: usize) -> Result<Vec<TokenMatrix>> {
        Ok(texts
            .iter()
            .map(|t| self.encode_one(t, max_length))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::maxsim;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_dense_is_normalized_and_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let out = embedder
            .encode(&texts(&["vitamin d trial", "vitamin d trial"]))
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 64);
        assert_eq!(out[0], out[1]);
        let norm: f32 = out[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_dense_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        let out = embedder.encode(&texts(&["the of"])).await.unwrap();
        assert!(out[0].iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_sparse_is_sorted_and_weighted() {
        let embedder = HashingSparseEmbedder::new();
        let out = embedder.embed(&texts(&["cell cell cell growth"])).await.unwrap();
        let v = &out[0];
        assert_eq!(v.len(), 2);
        assert!(v.indices().windows(2).all(|w| w[0] < w[1]));
        let mut weights = v.values().to_vec();
        weights.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((weights[0] - 1.0).abs() < 1e-6);
        assert!((weights[1] - (1.0 + 3f32.ln())).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_sparse_overlap_scores_higher() {
        let embedder = HashingSparseEmbedder::new();
        let out = embedder
            .embed(&texts(&[
                "does vitamin d reduce infection",
                "vitamin d reduces infection risk",
                "unrelated text about gardening",
            ]))
            .await
            .unwrap();
        assert!(out[0].dot(&out[1]) > out[0].dot(&out[2]));
        assert_eq!(out[0].dot(&out[2]), 0.0);
    }

    #[tokio::test]
    async fn test_token_rows_normalized_and_truncated() {
        let embedder = HashingTokenEmbedder::new(16);
        let out = embedder
            .encode_tokens(&texts(&["alpha beta gamma delta", ""]), 3)
            .await
            .unwrap();
        assert_eq!(out[0].len(), 3);
        assert_eq!(out[0].dim(), 16);
        for row in out[0].rows() {
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        assert!(out[1].is_empty());
    }

    #[tokio::test]
    async fn test_token_self_match_dominates() {
        let embedder = HashingTokenEmbedder::new(64);
        let out = embedder
            .encode_tokens(&texts(&["protein folding", "protein folding dynamics", "river delta"]), 32)
            .await
            .unwrap();
        let exact = maxsim(&out[0], &out[1]);
        let other = maxsim(&out[0], &out[2]);
        assert!((exact - 2.0).abs() < 1e-4);
        assert!(exact > other);
    }
}
