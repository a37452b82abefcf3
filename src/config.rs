use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub recall: RecallConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

/// Location of the local BEIR-style dataset
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    /// Directory holding the dataset (or a parent of it).
    pub dir: PathBuf,
    /// Dataset name, e.g. "scifact". Used to locate `dir/<name>`.
    #[serde(default = "default_dataset_name")]
    pub name: String,
    #[serde(default = "default_split")]
    pub split: String,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

/// Dense embedding configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    /// "hashing" (offline, deterministic) or "openai" (any OpenAI-compatible API)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Prepared document text is cut to this many characters (0 = no limit).
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Maximum number of corpus documents to index (0 = all).
    #[serde(default)]
    pub max_docs: usize,
}

/// Recall stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RecallConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Number of results shown and scored by the metrics.
    #[serde(default = "default_show")]
    pub show: usize,
    /// Prefix of the recall list handed to the reranker (defaults to top_k).
    #[serde(default)]
    pub rerank_depth: Option<usize>,
}

/// Reranker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RerankConfig {
    #[serde(default = "default_sparse_cache_capacity")]
    pub sparse_cache_capacity: usize,
    #[serde(default = "default_query_max_len")]
    pub query_max_len: usize,
    #[serde(default = "default_doc_max_len")]
    pub doc_max_len: usize,
    #[serde(default = "default_token_batch_size")]
    pub token_batch_size: usize,
    #[serde(default = "default_token_dimensions")]
    pub token_dimensions: usize,
}

/// Evaluation defaults (overridable from the CLI)
#[derive(Debug, Clone, Deserialize)]
pub struct EvalConfig {
    #[serde(default = "default_eval_limit")]
    pub limit: usize,
    #[serde(default)]
    pub covered_only: bool,
}

fn default_dataset_name() -> String {
    "scifact".to_string()
}

fn default_split() -> String {
    "test".to_string()
}

fn default_provider() -> String {
    "hashing".to_string()
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_batch_size() -> usize {
    64
}

fn default_dimensions() -> usize {
    384
}

fn default_max_chars() -> usize {
    2000
}

fn default_top_k() -> usize {
    100
}

fn default_show() -> usize {
    10
}

fn default_sparse_cache_capacity() -> usize {
    10_000
}

fn default_query_max_len() -> usize {
    64
}

fn default_doc_max_len() -> usize {
    300
}

fn default_token_batch_size() -> usize {
    8
}

fn default_token_dimensions() -> usize {
    128
}

fn default_eval_limit() -> usize {
    200
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_base: default_api_base(),
            batch_size: default_batch_size(),
            dimensions: default_dimensions(),
            max_chars: default_max_chars(),
            max_docs: 0,
        }
    }
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            show: default_show(),
            rerank_depth: None,
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            sparse_cache_capacity: default_sparse_cache_capacity(),
            query_max_len: default_query_max_len(),
            doc_max_len: default_doc_max_len(),
            token_batch_size: default_token_batch_size(),
            token_dimensions: default_token_dimensions(),
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            limit: default_eval_limit(),
            covered_only: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RERANKEVAL_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("RERANKEVAL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        match self.embeddings.provider.as_str() {
            "hashing" => {}
            "openai" => {
                std::env::var(&self.embeddings.api_key_env).with_context(|| {
                    format!(
                        "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                        self.embeddings.api_key_env
                    )
                })?;
            }
            other => anyhow::bail!(
                "embeddings.provider must be \"hashing\" or \"openai\", got \"{}\"",
                other
            ),
        }

        if self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.batch_size must be greater than 0");
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.recall.top_k == 0 {
            anyhow::bail!("recall.top_k must be greater than 0");
        }

        if self.recall.show == 0 {
            anyhow::bail!("recall.show must be greater than 0");
        }

        if self.recall.rerank_depth == Some(0) {
            anyhow::bail!("recall.rerank_depth must be greater than 0 when set");
        }

        if self.rerank.sparse_cache_capacity == 0 {
            anyhow::bail!("rerank.sparse_cache_capacity must be greater than 0");
        }

        if self.rerank.token_batch_size == 0 {
            anyhow::bail!("rerank.token_batch_size must be greater than 0");
        }

        if self.rerank.token_dimensions == 0 {
            anyhow::bail!("rerank.token_dimensions must be greater than 0");
        }

        if self.rerank.query_max_len == 0 || self.rerank.doc_max_len == 0 {
            anyhow::bail!("rerank.query_max_len and rerank.doc_max_len must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.store.db_path
    }

    /// Number of recall candidates passed to the reranker
    pub fn rerank_depth(&self) -> usize {
        self.recall.rerank_depth.unwrap_or(self.recall.top_k)
    }
}
