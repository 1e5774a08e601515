//! Vector store abstraction for knowledge base chunks.
//!
//! A [`StoreBackend`] owns the on-disk layout of a base's storage directory
//! and hands out [`VectorStore`] handles. Writes happen inside explicit
//! transactions; records become visible to queries once committed.

mod lance;
mod memory;
mod sqlite;

pub use lance::{LanceDbBackend, LanceDbStore};
pub use memory::{MemoryBackend, MemoryStats, MemoryStore};
pub use sqlite::{SqliteBackend, SqliteStore};

use crate::types::{ChunkMetadata, ScoredChunk, StoredChunk};
use async_trait::async_trait;
use docbase_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// Handle to one base's vector storage.
///
/// Transactions are not nested: `begin_transaction` while one is open is an
/// error, and `insert`/`delete` outside a transaction are errors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open a transaction.
    async fn begin_transaction(&mut self) -> AppResult<()>;

    /// Make every write since `begin_transaction` durable and visible.
    async fn commit_transaction(&mut self) -> AppResult<()>;

    /// Discard every write since `begin_transaction`. No-op without one.
    async fn rollback_transaction(&mut self) -> AppResult<()>;

    /// Add one chunk record under `group_id`.
    async fn insert(
        &mut self,
        group_id: &str,
        content: &str,
        vector: &[f32],
        metadata: &ChunkMetadata,
    ) -> AppResult<()>;

    /// Remove every record of `group_id`. No-op if there are none.
    async fn delete(&mut self, group_id: &str) -> AppResult<()>;

    /// Nearest neighbours of `query_vector`, best first, at most `k`.
    async fn query(
        &self,
        query_text: &str,
        query_vector: &[f32],
        k: usize,
    ) -> AppResult<Vec<ScoredChunk>>;
}

/// Creates, opens and removes per-base storage directories.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Backend name as used in configuration.
    fn name(&self) -> &str;

    /// Initialise empty storage in `dir`. The directory already exists.
    async fn create(&self, dir: &Path) -> AppResult<()>;

    /// Open storage previously initialised in `dir`.
    async fn connect(&self, dir: &Path) -> AppResult<Box<dyn VectorStore>>;

    /// Remove the storage in `dir`.
    async fn destroy(&self, dir: &Path) -> AppResult<()> {
        tokio::fs::remove_dir_all(dir).await?;
        Ok(())
    }
}

/// Create a store backend by name: "sqlite", "lancedb" or "memory".
pub fn create_backend(name: &str) -> AppResult<Arc<dyn StoreBackend>> {
    match name {
        "sqlite" => Ok(Arc::new(SqliteBackend)),
        "lancedb" => Ok(Arc::new(LanceDbBackend)),
        "memory" => Ok(Arc::new(MemoryBackend::new())),
        other => Err(AppError::Config(format!(
            "Unknown store backend: '{}'. Supported backends: sqlite, lancedb, memory",
            other
        ))),
    }
}

/// A write buffered until commit.
#[derive(Debug, Clone)]
pub(crate) enum PendingOp {
    Insert(PendingRecord),
    Delete(String),
}

/// A record buffered for insertion.
#[derive(Debug, Clone)]
pub(crate) struct PendingRecord {
    pub chunk: StoredChunk,
    pub vector: Vec<f32>,
}

impl PendingRecord {
    pub fn new(group_id: &str, content: &str, vector: &[f32], metadata: &ChunkMetadata) -> Self {
        Self {
            chunk: StoredChunk {
                group_id: group_id.to_string(),
                content: content.to_string(),
                metadata: metadata.clone(),
            },
            vector: vector.to_vec(),
        }
    }
}

/// Error for writes issued outside a transaction.
pub(crate) fn no_transaction(op: &str) -> AppError {
    AppError::Storage(format!("{} called outside a transaction", op))
}

/// Error for a nested `begin_transaction`.
pub(crate) fn transaction_open() -> AppError {
    AppError::Storage("A transaction is already open".to_string())
}

/// Calculate cosine similarity between two vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort hits best first and keep the top `k`. Ties keep insertion order.
pub(crate) fn rank(mut hits: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_create_backend() {
        assert_eq!(create_backend("sqlite").unwrap().name(), "sqlite");
        assert_eq!(create_backend("lancedb").unwrap().name(), "lancedb");
        assert_eq!(create_backend("memory").unwrap().name(), "memory");
        assert!(create_backend("redis").is_err());
    }
}
