use thiserror::Error;

/// Main error type for rerankeval
#[derive(Error, Debug)]
pub enum RerankError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding errors (dataset files)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dense, sparse or token encoding failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// No queries or judgments exist for the requested id
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Sparse vector violates the sorted/unique/aligned contract
    #[error("Malformed sparse vector: {0}")]
    MalformedSparseVector(String),

    /// Dataset layout or content errors
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Recall/search errors
    #[error("Search error: {0}")]
    Search(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using RerankError
pub type Result<T> = std::result::Result<T, RerankError>;
