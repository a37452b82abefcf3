//! Sparse lexical vectors and their merge-join dot product.

use crate::error::{RerankError, Result};

/// Sparse term-weight vector stored as parallel index/value arrays.
///
/// Indices are strictly increasing and aligned with `values`. Both invariants
/// are checked on construction, so [`SparseVector::dot`] can merge without
/// re-validating.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    /// Build a vector from already-sorted parallel arrays.
    ///
    /// Fails with [`RerankError::MalformedSparseVector`] when the lengths differ
    /// or the indices are not strictly increasing.
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(RerankError::MalformedSparseVector(format!(
                "{} indices but {} values",
                indices.len(),
                values.len()
            )));
        }
        if let Some(pos) = indices.windows(2).position(|w| w[0] >= w[1]) {
            return Err(RerankError::MalformedSparseVector(format!(
                "indices not strictly increasing at position {} ({} then {})",
                pos + 1,
                indices[pos],
                indices[pos + 1]
            )));
        }
        Ok(Self { indices, values })
    }

    /// Build a vector from unordered (index, value) pairs.
    /// Repeated indices are merged by summing their values.
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.sort_by_key(|(idx, _)| *idx);
        let mut indices: Vec<u32> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f32> = Vec::with_capacity(pairs.len());
        for (idx, val) in pairs {
            match indices.last() {
                Some(&last) if last == idx => {
                    if let Some(v) = values.last_mut() {
                        *v += val;
                    }
                }
                _ => {
                    indices.push(idx);
                    values.push(val);
                }
            }
        }
        Self { indices, values }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product by two-pointer merge over the sorted index arrays. O(|a| + |b|).
    pub fn dot(&self, other: &SparseVector) -> f32 {
        debug_assert!(self.indices.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(other.indices.windows(2).all(|w| w[0] < w[1]));

        let (a_idx, a_val) = (&self.indices, &self.values);
        let (b_idx, b_val) = (&other.indices, &other.values);
        let (mut i, mut j) = (0, 0);
        let mut acc = 0.0f32;
        while i < a_idx.len() && j < b_idx.len() {
            match a_idx[i].cmp(&b_idx[j]) {
                std::cmp::Ordering::Equal => {
                    acc += a_val[i] * b_val[j];
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        acc
    }
}
