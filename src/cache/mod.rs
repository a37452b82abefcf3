pub mod sparse_cache;

pub use sparse_cache::SparseVectorCache;
