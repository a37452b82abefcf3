//! Rank-quality metrics over binary relevance: nDCG@10, MRR@10 and Precision@K.
//!
//! Inputs are 0/1 labels in rank order (index 0 = top result).

use crate::search::Candidate;
use serde::Serialize;
use std::collections::HashMap;

const CUTOFF: usize = 10;

/// Discounted cumulative gain: sum of `gains[i] / log2(i + 2)`.
pub fn dcg(gains: &[f64]) -> f64 {
    gains
        .iter()
        .enumerate()
        .map(|(i, g)| g / ((i + 2) as f64).log2())
        .sum()
}

fn as_gains(binary: &[u8]) -> Vec<f64> {
    binary.iter().map(|&b| f64::from(b)).collect()
}

/// nDCG over the top 10 positions.
///
/// The ideal ordering is `binary` sorted descending. When the ideal DCG is 0
/// the denominator is 1.0, so a list without relevant items scores 0.
pub fn ndcg_at_10(binary: &[u8]) -> f64 {
    let gains = as_gains(&binary[..binary.len().min(CUTOFF)]);
    let mut ideal = binary.to_vec();
    ideal.sort_unstable_by(|a, b| b.cmp(a));
    ideal.truncate(CUTOFF);

    let ideal_dcg = dcg(&as_gains(&ideal));
    let denom = if ideal_dcg == 0.0 { 1.0 } else { ideal_dcg };
    dcg(&gains) / denom
}

/// Reciprocal of the 1-indexed rank of the first relevant result within the
/// top 10, or 0.0 if there is none.
pub fn mrr_at_10(binary: &[u8]) -> f64 {
    binary
        .iter()
        .take(CUTOFF)
        .position(|&b| b > 0)
        .map(|i| 1.0 / (i + 1) as f64)
        .unwrap_or(0.0)
}

/// Precision at K: relevant count in the top K divided by `min(k, len)`.
/// Returns 0.0 for an empty list or k == 0.
pub fn precision_at_k(binary: &[u8], k: usize) -> f64 {
    let denom = k.min(binary.len());
    if denom == 0 {
        return 0.0;
    }
    let relevant = binary.iter().take(k).filter(|&&b| b > 0).count();
    relevant as f64 / denom as f64
}

/// 1 for each candidate whose judged grade is > 0, else 0.
pub fn binary_relevance(candidates: &[Candidate], grades: Option<&HashMap<String, i32>>) -> Vec<u8> {
    candidates
        .iter()
        .map(|c| match grades.and_then(|g| g.get(&c.id)) {
            Some(&grade) if grade > 0 => 1,
            _ => 0,
        })
        .collect()
}

/// The three per-list metrics reported by the harness
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RankMetrics {
    pub ndcg_at_10: f64,
    pub mrr_at_10: f64,
    pub precision_at_10: f64,
}

impl RankMetrics {
    pub fn from_binary(binary: &[u8]) -> Self {
        Self {
            ndcg_at_10: ndcg_at_10(binary),
            mrr_at_10: mrr_at_10(binary),
            precision_at_10: precision_at_k(binary, CUTOFF),
        }
    }
}
