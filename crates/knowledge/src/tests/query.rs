use super::support::*;
use crate::knowledge_base::{Collaborators, KnowledgeBase};
use crate::progress::ProgressReporter;
use crate::store::{StoreBackend, VectorStore};
use crate::types::{ChunkMetadata, ScoredChunk, SourceKind, StoredChunk};
use async_trait::async_trait;
use docbase_core::{AppResult, RagConfig};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Backend whose store always answers with fixed scores.
struct FixedHitsBackend {
    scores: Vec<f32>,
    requested: Arc<Mutex<Vec<usize>>>,
}

struct FixedHitsStore {
    scores: Vec<f32>,
    requested: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl StoreBackend for FixedHitsBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn create(&self, _dir: &Path) -> AppResult<()> {
        Ok(())
    }

    async fn connect(&self, _dir: &Path) -> AppResult<Box<dyn VectorStore>> {
        Ok(Box::new(FixedHitsStore {
            scores: self.scores.clone(),
            requested: self.requested.clone(),
        }))
    }
}

#[async_trait]
impl VectorStore for FixedHitsStore {
    async fn begin_transaction(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn commit_transaction(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn insert(
        &mut self,
        _group_id: &str,
        _content: &str,
        _vector: &[f32],
        _metadata: &ChunkMetadata,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn delete(&mut self, _group_id: &str) -> AppResult<()> {
        Ok(())
    }

    async fn query(
        &self,
        _query_text: &str,
        _query_vector: &[f32],
        k: usize,
    ) -> AppResult<Vec<ScoredChunk>> {
        self.requested.lock().unwrap().push(k);
        Ok(self
            .scores
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, score)| ScoredChunk {
                chunk: StoredChunk {
                    group_id: format!("g{}", i),
                    content: format!("chunk {}", i),
                    metadata: ChunkMetadata {
                        uuid: format!("g{}", i),
                        kind: SourceKind::Text,
                        title: "fixed".to_string(),
                        url: "fixed".to_string(),
                    },
                },
                score: *score,
            })
            .collect())
    }
}

fn fixed_base(scores: Vec<f32>, config: RagConfig) -> (KnowledgeBase, Arc<Mutex<Vec<usize>>>) {
    let requested = Arc::new(Mutex::new(Vec::new()));
    let collaborators = Collaborators {
        loader: Arc::new(ScriptedLoader::default()),
        splitter: Arc::new(LineSplitter { chunk_size: 100 }),
        embedder: Arc::new(RecordingEmbedder::new()),
        backend: Arc::new(FixedHitsBackend {
            scores,
            requested: requested.clone(),
        }),
    };
    let base = KnowledgeBase::new(info(), "/unused", config, collaborators).unwrap();
    (base, requested)
}

#[tokio::test]
async fn test_relevance_filter_and_limit() {
    let config = RagConfig {
        search_result_count: 3,
        relevance_cut_off: 0.5,
        query_oversample: 10,
        ..Default::default()
    };
    let scores = vec![
        0.9, 0.7, 0.6, 0.5, 0.45, 0.4, 0.35, 0.3, 0.25, 0.2, 0.15, 0.1, 0.05,
    ];
    let (base, requested) = fixed_base(scores, config);

    let results = base.query("anything").await.unwrap();

    let kept: Vec<f32> = results.iter().map(|r| r.score).collect();
    assert_eq!(kept, vec![0.9, 0.7, 0.6]);
    assert_eq!(*requested.lock().unwrap(), vec![13]);
}

#[tokio::test]
async fn test_cutoff_is_strict() {
    let config = RagConfig {
        search_result_count: 5,
        relevance_cut_off: 0.5,
        ..Default::default()
    };
    let (base, _) = fixed_base(vec![0.8, 0.5, 0.5, 0.3], config);

    let results = base.query("anything").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.uuid, "g0");
}

#[tokio::test]
async fn test_exact_chunk_ranks_first() {
    let h = Harness::new(ScriptedLoader::default()).await;
    let progress = ProgressReporter::noop();
    h.base
        .add(
            "notes",
            SourceKind::Text,
            "ownership and borrowing rules\nsourdough starter feeding schedule\ntide tables for the harbour",
            &progress,
        )
        .await
        .unwrap();

    let results = h.base.query("sourdough starter feeding schedule").await.unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].content, "sourdough starter feeding schedule");
    assert!(results[0].score > 0.99);
    assert_eq!(results[0].metadata.uuid, "notes");
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_query_on_empty_base() {
    let h = Harness::new(ScriptedLoader::default()).await;
    assert!(h.base.query("anything").await.unwrap().is_empty());
}
