//! Scripted collaborators shared by the engine tests.

use crate::chunk::Splitter;
use crate::embeddings::providers::MockProvider;
use crate::embeddings::EmbeddingProvider;
use crate::knowledge_base::{BaseInfo, Collaborators, KnowledgeBase};
use crate::loader::Loader;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::store::{MemoryBackend, StoreBackend, VectorStore};
use crate::types::{ChunkMetadata, ScoredChunk, SourceKind};
use async_trait::async_trait;
use docbase_core::{AppError, AppResult, RagConfig};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const ENGINE: &str = "mock";
pub const MODEL: &str = "mock-model";

/// Loader returning literal text, scripted file contents, or scripted failures.
#[derive(Default)]
pub struct ScriptedLoader {
    pub contents: HashMap<String, String>,
    pub failing: Vec<String>,
}

impl ScriptedLoader {
    pub fn fail_on(mut self, suffix: &str) -> Self {
        self.failing.push(suffix.to_string());
        self
    }

    pub fn with(mut self, origin: &str, text: &str) -> Self {
        self.contents.insert(origin.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl Loader for ScriptedLoader {
    fn is_parseable(&self, kind: SourceKind, origin: &str) -> bool {
        kind != SourceKind::Folder && !origin.ends_with(".bin")
    }

    async fn load(&self, kind: SourceKind, origin: &str) -> AppResult<String> {
        if self.failing.iter().any(|s| origin.ends_with(s.as_str())) {
            return Err(AppError::LoadFailed(format!("scripted failure for {}", origin)));
        }
        if let Some(text) = self.contents.get(origin) {
            return Ok(text.clone());
        }
        match kind {
            SourceKind::File => Ok(tokio::fs::read_to_string(origin).await?),
            _ => Ok(origin.to_string()),
        }
    }
}

/// One chunk per non-empty line.
pub struct LineSplitter {
    pub chunk_size: usize,
}

impl Splitter for LineSplitter {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn split(&self, text: &str) -> AppResult<Vec<String>> {
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Mock embedder that records the size of every batch.
#[derive(Debug)]
pub struct RecordingEmbedder {
    inner: MockProvider,
    pub batches: Mutex<Vec<usize>>,
    /// Drop the last vector of every batch
    pub short_by_one: bool,
    /// Fail every batch after this many
    pub fail_after_batches: Option<usize>,
}

impl RecordingEmbedder {
    pub fn new() -> Self {
        Self {
            inner: MockProvider::with_model(MODEL, 16),
            batches: Mutex::new(Vec::new()),
            short_by_one: false,
            fail_after_batches: None,
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for RecordingEmbedder {
    fn provider_name(&self) -> &str {
        ENGINE
    }

    fn model_name(&self) -> &str {
        MODEL
    }

    fn dimensions(&self) -> Option<usize> {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let seen = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(texts.len());
            batches.len()
        };
        if self.fail_after_batches.is_some_and(|limit| seen > limit) {
            return Err(AppError::Embedding("scripted outage".to_string()));
        }
        let mut vectors = self.inner.embed_batch(texts).await?;
        if self.short_by_one {
            vectors.pop();
        }
        Ok(vectors)
    }
}

/// Commit countdown shared by a [`FlakyBackend`] and its stores.
#[derive(Debug, Default)]
pub struct CommitFault {
    countdown: Mutex<Option<usize>>,
}

impl CommitFault {
    /// Let `successes` more commits through, then fail one.
    pub fn fail_after(&self, successes: usize) {
        *self.countdown.lock().unwrap() = Some(successes);
    }

    fn should_fail(&self) -> bool {
        let mut countdown = self.countdown.lock().unwrap();
        match *countdown {
            Some(0) => {
                *countdown = None;
                true
            }
            Some(n) => {
                *countdown = Some(n - 1);
                false
            }
            None => false,
        }
    }
}

/// Memory backend whose commits can be made to fail.
pub struct FlakyBackend {
    inner: Arc<MemoryBackend>,
    fault: Arc<CommitFault>,
}

struct FlakyStore {
    inner: Box<dyn VectorStore>,
    fault: Arc<CommitFault>,
}

#[async_trait]
impl StoreBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky-memory"
    }

    async fn create(&self, dir: &Path) -> AppResult<()> {
        self.inner.create(dir).await
    }

    async fn connect(&self, dir: &Path) -> AppResult<Box<dyn VectorStore>> {
        Ok(Box::new(FlakyStore {
            inner: self.inner.connect(dir).await?,
            fault: self.fault.clone(),
        }))
    }

    async fn destroy(&self, dir: &Path) -> AppResult<()> {
        self.inner.destroy(dir).await
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn begin_transaction(&mut self) -> AppResult<()> {
        self.inner.begin_transaction().await
    }

    async fn commit_transaction(&mut self) -> AppResult<()> {
        if self.fault.should_fail() {
            return Err(AppError::Storage("disk full".to_string()));
        }
        self.inner.commit_transaction().await
    }

    async fn rollback_transaction(&mut self) -> AppResult<()> {
        self.inner.rollback_transaction().await
    }

    async fn insert(
        &mut self,
        group_id: &str,
        content: &str,
        vector: &[f32],
        metadata: &ChunkMetadata,
    ) -> AppResult<()> {
        self.inner.insert(group_id, content, vector, metadata).await
    }

    async fn delete(&mut self, group_id: &str) -> AppResult<()> {
        self.inner.delete(group_id).await
    }

    async fn query(
        &self,
        query_text: &str,
        query_vector: &[f32],
        k: usize,
    ) -> AppResult<Vec<ScoredChunk>> {
        self.inner.query(query_text, query_vector, k).await
    }
}

/// A knowledge base wired to scripted collaborators and a memory store.
pub struct Harness {
    pub base: Arc<KnowledgeBase>,
    pub backend: Arc<MemoryBackend>,
    pub fault: Arc<CommitFault>,
    pub embedder: Arc<RecordingEmbedder>,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new(loader: ScriptedLoader) -> Self {
        Self::build(loader, RecordingEmbedder::new(), 100, RagConfig::default()).await
    }

    pub async fn build(
        loader: ScriptedLoader,
        embedder: RecordingEmbedder,
        chunk_size: usize,
        config: RagConfig,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let fault = Arc::new(CommitFault::default());
        let embedder = Arc::new(embedder);

        let collaborators = Collaborators {
            loader: Arc::new(loader),
            splitter: Arc::new(LineSplitter { chunk_size }),
            embedder: embedder.clone(),
            backend: Arc::new(FlakyBackend {
                inner: backend.clone(),
                fault: fault.clone(),
            }),
        };
        let base = KnowledgeBase::new(info(), dir.path().join("base"), config, collaborators)
            .unwrap();
        base.create().await.unwrap();

        Self {
            base: Arc::new(base),
            backend,
            fault,
            embedder,
            dir,
        }
    }

    pub async fn stats(&self) -> crate::store::MemoryStats {
        self.backend.stats(self.base.storage_dir()).await.unwrap()
    }

    pub async fn stats_missing(&self) -> bool {
        self.backend.stats(self.base.storage_dir()).await.is_none()
    }

    pub async fn group_counts(&self) -> HashMap<String, usize> {
        self.backend.group_counts(self.base.storage_dir()).await
    }
}

pub fn info() -> BaseInfo {
    BaseInfo {
        uuid: "base-1".to_string(),
        name: "test base".to_string(),
        embedding_engine: ENGINE.to_string(),
        embedding_model: MODEL.to_string(),
    }
}

/// Reporter collecting every event.
pub fn collecting_reporter() -> (ProgressReporter, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let reporter = ProgressReporter::new(Arc::new(move |event| {
        sink.lock().unwrap().push(event);
    }));
    (reporter, events)
}

/// `count` numbered lines.
pub fn lines(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!("{} {}", prefix, i))
        .collect::<Vec<_>>()
        .join("\n")
}
