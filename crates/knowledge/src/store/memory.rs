//! In-memory vector store for tests and ephemeral bases.
//!
//! Storage lives inside the [`MemoryBackend`] value, keyed by directory, so
//! handles connected to the same directory share records. Writes are
//! buffered per handle and applied at commit, and the backend counts commits
//! so callers can observe transaction boundaries.

use super::{
    cosine_similarity, no_transaction, rank, transaction_open, PendingOp, PendingRecord,
    StoreBackend, VectorStore,
};
use crate::types::{ChunkMetadata, ScoredChunk};
use async_trait::async_trait;
use docbase_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<PendingRecord>,
    commits: usize,
}

/// Snapshot of one in-memory store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Committed records
    pub records: usize,

    /// Committed transactions
    pub commits: usize,

    /// Distinct group ids among committed records
    pub groups: usize,
}

/// Backend keeping every store in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    stores: Mutex<HashMap<PathBuf, Arc<RwLock<MemoryState>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics for the store in `dir`, if it exists.
    pub async fn stats(&self, dir: &Path) -> Option<MemoryStats> {
        let state = self.stores.lock().await.get(dir).cloned()?;
        let state = state.read().await;

        let mut groups: Vec<&str> = state
            .records
            .iter()
            .map(|r| r.chunk.group_id.as_str())
            .collect();
        groups.sort_unstable();
        groups.dedup();

        Some(MemoryStats {
            records: state.records.len(),
            commits: state.commits,
            groups: groups.len(),
        })
    }

    /// Committed record count per group id in `dir`.
    pub async fn group_counts(&self, dir: &Path) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        let state = match self.stores.lock().await.get(dir).cloned() {
            Some(state) => state,
            None => return counts,
        };

        for record in &state.read().await.records {
            *counts.entry(record.chunk.group_id.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, dir: &Path) -> AppResult<()> {
        self.stores
            .lock()
            .await
            .insert(dir.to_path_buf(), Arc::new(RwLock::new(MemoryState::default())));
        Ok(())
    }

    async fn connect(&self, dir: &Path) -> AppResult<Box<dyn VectorStore>> {
        let state = self
            .stores
            .lock()
            .await
            .get(dir)
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("No in-memory store for {:?}", dir)))?;

        Ok(Box::new(MemoryStore {
            state,
            pending: None,
        }))
    }

    async fn destroy(&self, dir: &Path) -> AppResult<()> {
        self.stores.lock().await.remove(dir);
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Handle on one in-memory store.
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    pending: Option<Vec<PendingOp>>,
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn begin_transaction(&mut self) -> AppResult<()> {
        if self.pending.is_some() {
            return Err(transaction_open());
        }
        self.pending = Some(Vec::new());
        Ok(())
    }

    async fn commit_transaction(&mut self) -> AppResult<()> {
        let ops = self
            .pending
            .take()
            .ok_or_else(|| no_transaction("commit_transaction"))?;

        let mut state = self.state.write().await;
        for op in ops {
            match op {
                PendingOp::Insert(record) => state.records.push(record),
                PendingOp::Delete(group_id) => {
                    state.records.retain(|r| r.chunk.group_id != group_id)
                }
            }
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> AppResult<()> {
        self.pending = None;
        Ok(())
    }

    async fn insert(
        &mut self,
        group_id: &str,
        content: &str,
        vector: &[f32],
        metadata: &ChunkMetadata,
    ) -> AppResult<()> {
        let pending = self.pending.as_mut().ok_or_else(|| no_transaction("insert"))?;
        pending.push(PendingOp::Insert(PendingRecord::new(
            group_id, content, vector, metadata,
        )));
        Ok(())
    }

    async fn delete(&mut self, group_id: &str) -> AppResult<()> {
        let pending = self.pending.as_mut().ok_or_else(|| no_transaction("delete"))?;
        pending.push(PendingOp::Delete(group_id.to_string()));
        Ok(())
    }

    async fn query(
        &self,
        _query_text: &str,
        query_vector: &[f32],
        k: usize,
    ) -> AppResult<Vec<ScoredChunk>> {
        let state = self.state.read().await;
        let hits = state
            .records
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.chunk.clone(),
                score: cosine_similarity(query_vector, &record.vector),
            })
            .collect();

        Ok(rank(hits, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;

    fn metadata(id: &str) -> ChunkMetadata {
        ChunkMetadata {
            uuid: id.to_string(),
            kind: SourceKind::File,
            title: "doc".to_string(),
            url: "/doc.txt".to_string(),
        }
    }

    #[tokio::test]
    async fn test_writes_visible_after_commit() {
        let backend = MemoryBackend::new();
        let dir = Path::new("/mem/base");
        backend.create(dir).await.unwrap();

        let mut writer = backend.connect(dir).await.unwrap();
        let reader = backend.connect(dir).await.unwrap();

        writer.begin_transaction().await.unwrap();
        writer.insert("a", "alpha", &[1.0, 0.0], &metadata("a")).await.unwrap();
        assert!(reader.query("q", &[1.0, 0.0], 5).await.unwrap().is_empty());

        writer.commit_transaction().await.unwrap();
        let hits = reader.query("q", &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.content, "alpha");

        let stats = backend.stats(dir).await.unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.groups, 1);
    }

    #[tokio::test]
    async fn test_delete_applies_in_order() {
        let backend = MemoryBackend::new();
        let dir = Path::new("/mem/order");
        backend.create(dir).await.unwrap();
        let mut store = backend.connect(dir).await.unwrap();

        store.begin_transaction().await.unwrap();
        store.insert("a", "old", &[1.0], &metadata("a")).await.unwrap();
        store.delete("a").await.unwrap();
        store.insert("a", "new", &[1.0], &metadata("a")).await.unwrap();
        store.commit_transaction().await.unwrap();

        let hits = store.query("q", &[1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.content, "new");
        assert_eq!(backend.group_counts(dir).await.get("a"), Some(&1));
    }

    #[tokio::test]
    async fn test_transaction_rules() {
        let backend = MemoryBackend::new();
        let dir = Path::new("/mem/rules");
        backend.create(dir).await.unwrap();
        let mut store = backend.connect(dir).await.unwrap();

        assert!(store.insert("a", "x", &[1.0], &metadata("a")).await.is_err());
        assert!(store.commit_transaction().await.is_err());
        store.begin_transaction().await.unwrap();
        assert!(store.begin_transaction().await.is_err());
        store.rollback_transaction().await.unwrap();
        store.begin_transaction().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_and_destroy() {
        let backend = MemoryBackend::new();
        let dir = Path::new("/mem/missing");
        assert!(backend.connect(dir).await.is_err());

        backend.create(dir).await.unwrap();
        backend.destroy(dir).await.unwrap();
        assert!(backend.stats(dir).await.is_none());
    }
}
