//! Corpus indexing: document text preparation, batched embedding, and writes
//! into the vector store.

use crate::dataset::{Corpus, CorpusDocument};
use crate::embeddings::Embedder;
use crate::error::{RerankError, Result};
use crate::search::{SqliteVectorStore, StoredDocument};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Instant;

/// Indexing knobs, usually taken from `[embeddings]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexOptions {
    pub batch_size: usize,
    /// Character cap on the text sent to the encoder
    pub max_chars: usize,
    /// 0 = whole corpus
    pub max_docs: usize,
}

impl IndexOptions {
    pub fn from_config(config: &crate::config::EmbeddingsConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_chars: config.max_chars,
            max_docs: config.max_docs,
        }
    }
}

/// Text indexed for a document: `title + " " + text`, trimmed, then cut to
/// `max_chars` characters (0 = no cap).
pub fn prepare_text(doc: &CorpusDocument, max_chars: usize) -> String {
    let joined = format!("{} {}", doc.title, doc.text);
    let trimmed = joined.trim();
    if max_chars == 0 {
        return trimmed.to_string();
    }
    match trimmed.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => trimmed[..byte_idx].to_string(),
        None => trimmed.to_string(),
    }
}

/// Seed for the corpus sample, fixed so every run indexes the same documents
pub const SAMPLE_SEED: u64 = 42;

/// Documents to index: the corpus sorted by id, shuffled with [`SAMPLE_SEED`],
/// then capped at `max_docs` (0 = all).
pub fn select_documents(corpus: &Corpus, max_docs: usize) -> Vec<(&String, &CorpusDocument)> {
    let mut docs: Vec<_> = corpus.iter().collect();
    docs.sort_by(|a, b| a.0.cmp(b.0));
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    docs.shuffle(&mut rng);
    if max_docs > 0 {
        docs.truncate(max_docs);
    }
    docs
}

/// Embed and upsert the selected corpus documents batch by batch.
///
/// Returns the number of documents written. An encoder or store failure stops
/// indexing; batches already written stay in the store.
pub async fn index_corpus(
    store: &SqliteVectorStore,
    embedder: &dyn Embedder,
    corpus: &Corpus,
    options: IndexOptions,
) -> Result<usize> {
    if options.batch_size == 0 {
        return Err(RerankError::InvalidInput("batch_size must be greater than 0".to_string()));
    }

    let selected = select_documents(corpus, options.max_docs);
    let total = selected.len();
    let batches = total.div_ceil(options.batch_size);
    log::info!(
        "Indexing {} of {} documents in {} batch(es) of {}",
        total,
        corpus.len(),
        batches,
        options.batch_size
    );

    let start = Instant::now();
    let mut written = 0;

    for (batch_no, batch) in selected.chunks(options.batch_size).enumerate() {
        let batch_start = Instant::now();
        let texts: Vec<String> = batch
            .iter()
            .map(|(_, doc)| prepare_text(doc, options.max_chars))
            .collect();

        let embeddings = embedder.encode(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(RerankError::Embedding(format!(
                "Encoder returned {} vectors for {} documents",
                embeddings.len(),
                texts.len()
            )));
        }
        let embed_secs = batch_start.elapsed().as_secs_f64();

        let docs: Vec<StoredDocument> = batch
            .iter()
            .zip(texts)
            .zip(embeddings)
            .map(|(((id, _), text), embedding)| StoredDocument {
                id: (*id).clone(),
                text,
                embedding,
            })
            .collect();

        let upsert_start = Instant::now();
        written += store.upsert_documents(docs).await?;
        log::info!(
            "[{}/{}] {} docs, embed {:.2}s, upsert {:.2}s",
            batch_no + 1,
            batches,
            batch.len(),
            embed_secs,
            upsert_start.elapsed().as_secs_f64()
        );
    }

    log::info!("Indexed {} documents in {:?}", written, start.elapsed());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::search::VectorStore;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn doc(title: &str, text: &str) -> CorpusDocument {
        CorpusDocument {
            title: title.to_string(),
            text: text.to_string(),
        }
    }

    fn corpus(n: usize) -> Corpus {
        (0..n)
            .map(|i| (format!("d{:02}", i), doc(&format!("Title {}", i), "body text")))
            .collect()
    }

    fn options(batch_size: usize, max_docs: usize) -> IndexOptions {
        IndexOptions {
            batch_size,
            max_chars: 2000,
            max_docs,
        }
    }

    #[test]
    fn test_prepare_text_joins_and_trims() {
        assert_eq!(prepare_text(&doc("Title", "Body"), 0), "Title Body");
        assert_eq!(prepare_text(&doc("", "Body"), 0), "Body");
        assert_eq!(prepare_text(&doc("", ""), 0), "");
    }

    #[test]
    fn test_prepare_text_truncates_on_char_boundary() {
        assert_eq!(prepare_text(&doc("abc", "def"), 5), "abc d");
        assert_eq!(prepare_text(&doc("", "héllo"), 2), "hé");
        assert_eq!(prepare_text(&doc("", "short"), 100), "short");
    }

    #[test]
    fn test_select_documents_seeded_sample() {
        let corpus = corpus(20);
        let first: Vec<&String> = select_documents(&corpus, 5).into_iter().map(|(id, _)| id).collect();
        let again: Vec<&String> = select_documents(&corpus, 5).into_iter().map(|(id, _)| id).collect();
        assert_eq!(first.len(), 5);
        assert_eq!(first, again);

        // the sample does not depend on map iteration order
        let rebuilt: Corpus = corpus.iter().collect::<Vec<_>>().into_iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect();
        let other: Vec<String> = select_documents(&rebuilt, 5).into_iter().map(|(id, _)| id.clone()).collect();
        let first_owned: Vec<String> = first.into_iter().cloned().collect();
        assert_eq!(first_owned, other);
    }

    #[test]
    fn test_select_documents_zero_takes_all() {
        let corpus = corpus(5);
        let mut ids: Vec<&String> = select_documents(&corpus, 0).into_iter().map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec!["d00", "d01", "d02", "d03", "d04"]);
    }

    #[tokio::test]
    async fn test_index_corpus_writes_all_batches() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(temp_dir.path().join("idx.db")).await.unwrap();
        let embedder = HashingEmbedder::new(32);

        let written = index_corpus(&store, &embedder, &corpus(7), options(3, 0)).await.unwrap();
        assert_eq!(written, 7);
        assert_eq!(store.count().await.unwrap(), 7);
        assert_eq!(store.dimension().await.unwrap(), Some(32));
        assert!(store.list_document_ids().await.unwrap().contains("d06"));
    }

    #[tokio::test]
    async fn test_index_corpus_respects_max_docs() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(temp_dir.path().join("idx.db")).await.unwrap();
        let embedder = HashingEmbedder::new(16);

        let corpus = corpus(10);
        let written = index_corpus(&store, &embedder, &corpus, options(4, 2)).await.unwrap();
        assert_eq!(written, 2);
        let ids = store.list_document_ids().await.unwrap();
        for (id, _) in select_documents(&corpus, 2) {
            assert!(ids.contains(id));
        }
    }

    #[tokio::test]
    async fn test_index_corpus_rejects_zero_batch() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(temp_dir.path().join("idx.db")).await.unwrap();
        let embedder = HashingEmbedder::new(16);
        let result = index_corpus(&store, &embedder, &corpus(1), options(0, 0)).await;
        assert!(matches!(result, Err(RerankError::InvalidInput(_))));
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        async fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0, 0.0, 0.0]])
        }
    }

    #[tokio::test]
    async fn test_index_corpus_count_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(temp_dir.path().join("idx.db")).await.unwrap();
        let result = index_corpus(&store, &ShortEmbedder, &corpus(3), options(3, 0)).await;
        assert!(matches!(result, Err(RerankError::Embedding(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
