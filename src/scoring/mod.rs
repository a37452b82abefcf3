//! Similarity kernels used by the rerankers.

pub mod maxsim;
pub mod sparse;

pub use maxsim::{maxsim, TokenMatrix};
pub use sparse::SparseVector;
