//! SQLite-backed document store with a lazily loaded in-memory cosine index.
//!
//! Documents and their embeddings are persisted as little-endian f32 BLOBs.
//! The first `retrieve` loads every row into a [`MemoryIndex`]; later calls score
//! in memory. Writes through this handle invalidate the loaded index.

use crate::db::{migrate, Db};
use crate::error::{RerankError, Result};
use crate::search::{Candidate, MemoryIndex, StoredDocument, VectorStore};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Persistent vector store for the recall stage
pub struct SqliteVectorStore {
    db: Db,
    /// None = not loaded
    index: RwLock<Option<Arc<MemoryIndex>>>,
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(RerankError::Search(format!(
            "Invalid embedding BLOB length {}",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

impl SqliteVectorStore {
    /// Open (creating if needed) the store at `db_path` and apply migrations
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db = Db::new(db_path);
        db.with_connection(|conn| migrate::run_migrations(conn)).await?;
        Ok(Self {
            db,
            index: RwLock::new(None),
        })
    }

    fn invalidate(&self) {
        *self.index.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Remove every document and collection setting
    pub async fn reset(&self) -> Result<()> {
        self.db
            .with_connection(|conn| {
                conn.execute_batch("DELETE FROM documents; DELETE FROM collection_meta;")?;
                Ok(())
            })
            .await?;
        self.invalidate();
        log::info!("Collection at {} reset", self.db.path().display());
        Ok(())
    }

    /// Insert or replace documents in one transaction.
    ///
    /// The first write fixes the collection dimension; later documents of another
    /// width are rejected.
    pub async fn upsert_documents(&self, docs: Vec<StoredDocument>) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let dim = docs[0].embedding.len();
        if let Some(bad) = docs.iter().find(|d| d.embedding.len() != dim) {
            return Err(RerankError::InvalidInput(format!(
                "Document {} has dimension {}, expected {}",
                bad.id,
                bad.embedding.len(),
                dim
            )));
        }

        let count = self
            .db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT value FROM collection_meta WHERE key = 'dimension'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                match existing {
                    Some(value) if value != dim.to_string() => {
                        return Err(RerankError::InvalidInput(format!(
                            "Collection dimension is {}, got documents of dimension {}",
                            value, dim
                        )));
                    }
                    Some(_) => {}
                    None => {
                        tx.execute(
                            "INSERT INTO collection_meta (key, value) VALUES ('dimension', ?1)",
                            params![dim.to_string()],
                        )?;
                    }
                }

                let mut written = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR REPLACE INTO documents (doc_id, text, embedding, dimension)
                         VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for doc in &docs {
                        written += stmt.execute(params![
                            doc.id,
                            doc.text,
                            embedding_to_blob(&doc.embedding),
                            doc.embedding.len() as i64
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(written)
            })
            .await?;

        self.invalidate();
        Ok(count)
    }

    /// Number of stored documents
    pub async fn count(&self) -> Result<usize> {
        self.db
            .with_connection(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
                Ok(n as usize)
            })
            .await
    }

    /// Collection embedding dimension, if any document has been written
    pub async fn dimension(&self) -> Result<Option<usize>> {
        let value: Option<String> = self
            .db
            .with_connection(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM collection_meta WHERE key = 'dimension'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        value
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|_| RerankError::Search(format!("Invalid stored dimension: {}", v)))
            })
            .transpose()
    }

    /// Load all documents into memory. Idempotent: reloads if already loaded.
    pub async fn load(&self) -> Result<Arc<MemoryIndex>> {
        let rows = self
            .db
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT doc_id, text, embedding FROM documents")?;
                let mut rows = stmt.query([])?;
                let mut docs = Vec::new();
                while let Some(row) = rows.next()? {
                    let blob: Vec<u8> = row.get(2)?;
                    docs.push(StoredDocument {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        embedding: blob_to_embedding(&blob)?,
                    });
                }
                Ok(docs)
            })
            .await?;

        let index = Arc::new(MemoryIndex::new(rows));
        log::info!("Vector index loaded: {} documents", index.len());
        *self.index.write().unwrap_or_else(|e| e.into_inner()) = Some(index.clone());
        Ok(index)
    }

    async fn loaded_index(&self) -> Result<Arc<MemoryIndex>> {
        let cached = self
            .index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match cached {
            Some(index) => Ok(index),
            None => self.load().await,
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn retrieve(&self, query: &[f32], top_k: usize) -> Result<Vec<Candidate>> {
        let index = self.loaded_index().await?;
        index.top_k(query, top_k)
    }

    async fn list_document_ids(&self) -> Result<HashSet<String>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT doc_id FROM documents")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<HashSet<_>, rusqlite::Error>>()?;
                Ok(ids)
            })
            .await
    }
}
