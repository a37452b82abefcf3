//! MaxSim computation for ColBERT-style late interaction.

use crate::error::{RerankError, Result};

/// Per-token embeddings for one text, stored row-major.
///
/// Rows are expected to be L2-normalized by the producer, with padding and
/// boundary-marker tokens already dropped. A matrix may hold zero rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMatrix {
    dim: usize,
    data: Vec<f32>,
}

impl TokenMatrix {
    /// Wrap a flat row-major buffer of `dim`-wide rows.
    pub fn new(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(RerankError::InvalidInput(
                "token matrix dimension must be greater than 0".to_string(),
            ));
        }
        if data.len() % dim != 0 {
            return Err(RerankError::InvalidInput(format!(
                "token buffer of length {} is not a multiple of dimension {}",
                data.len(),
                dim
            )));
        }
        Ok(Self { dim, data })
    }

    /// Build from individual token rows, all of width `dim`.
    pub fn from_rows(dim: usize, rows: Vec<Vec<f32>>) -> Result<Self> {
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(RerankError::InvalidInput(format!(
                    "token row {} has dimension {}, expected {}",
                    i,
                    row.len(),
                    dim
                )));
            }
            data.extend(row);
        }
        Self::new(dim, data)
    }

    /// Matrix with no tokens.
    pub fn empty(dim: usize) -> Self {
        Self {
            dim: dim.max(1),
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of token rows.
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim)
    }
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute MaxSim score between query and document token matrices.
///
/// For each query token, finds the maximum similarity (dot product) with any
/// document token, then sums all these maxima. Returns `f32::NEG_INFINITY` if
/// either side has no tokens so that such documents sort last.
///
/// Both matrices must share a dimension; on a mismatch the score is also
/// `f32::NEG_INFINITY`.
pub fn maxsim(query: &TokenMatrix, doc: &TokenMatrix) -> f32 {
    if query.is_empty() || doc.is_empty() || query.dim() != doc.dim() {
        return f32::NEG_INFINITY;
    }

    query
        .rows()
        .map(|q| {
            doc.rows()
                .map(|d| dot_product(q, d))
                .fold(f32::NEG_INFINITY, f32::max)
        })
        .sum()
}
