pub mod config;
pub mod error;
pub mod db;
pub mod cache;
pub mod scoring;
pub mod embeddings;
pub mod search;
pub mod rerank;
pub mod dataset;
pub mod ingest;
pub mod eval;

pub use config::Config;
pub use error::{RerankError, Result};
