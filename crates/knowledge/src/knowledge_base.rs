//! Knowledge base orchestration.
//!
//! A [`KnowledgeBase`] owns one vector store and the ordered list of document
//! sources ingested into it. Ingestion runs Loader → Splitter → Embedder →
//! VectorStore; queries embed the question and filter the nearest
//! neighbours by relevance.
//!
//! Mutating operations (`create`, `add`, `add_folder`, `delete`, `destroy`)
//! hold a per-base write guard for their whole duration. The registry sits
//! behind its own lock so callers can watch a folder fill up while it is
//! being ingested.

use crate::batching::{BatchPlan, DELETE_COMMIT_EVERY, FOLDER_PROGRESS_EVERY, INSERT_COMMIT_EVERY};
use crate::chunk::{create_splitter, Splitter};
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::loader::{extract_title, DefaultLoader, Loader};
use crate::progress::ProgressReporter;
use crate::store::{create_backend, StoreBackend, VectorStore};
use crate::types::{
    ChunkMetadata, DocumentSource, FailedFile, FolderIngestReport, IngestOptions, QueryResult,
    SourceKind,
};
use docbase_core::{AppError, AppResult, RagConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Identity of a knowledge base. The engine/model pair never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseInfo {
    pub uuid: String,
    pub name: String,
    pub embedding_engine: String,
    pub embedding_model: String,
}

/// The pluggable parts of the ingestion pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub loader: Arc<dyn Loader>,
    pub splitter: Arc<dyn Splitter>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub backend: Arc<dyn StoreBackend>,
}

impl Collaborators {
    /// Default collaborators for an engine/model pair.
    pub fn from_config(engine: &str, model: &str, config: &RagConfig) -> AppResult<Self> {
        Ok(Self {
            loader: Arc::new(DefaultLoader::new()?),
            splitter: Arc::from(create_splitter(&config.splitter, config)?),
            embedder: create_provider(engine, model)?,
            backend: create_backend(&config.store_backend)?,
        })
    }
}

type StoreSlot = Option<Box<dyn VectorStore>>;

/// A named, independently stored collection of documents.
pub struct KnowledgeBase {
    info: BaseInfo,
    storage_dir: PathBuf,
    config: RwLock<RagConfig>,
    loader: Arc<dyn Loader>,
    splitter: Arc<dyn Splitter>,
    embedder: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn StoreBackend>,
    write_guard: Mutex<()>,
    store: Mutex<StoreSlot>,
    documents: RwLock<Vec<DocumentSource>>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("info", &self.info)
            .field("storage_dir", &self.storage_dir)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl KnowledgeBase {
    /// Build a knowledge base around its collaborators.
    ///
    /// Fails with `Config` when the embedder is not the base's engine/model
    /// pair.
    pub fn new(
        info: BaseInfo,
        storage_dir: impl Into<PathBuf>,
        config: RagConfig,
        collaborators: Collaborators,
    ) -> AppResult<Self> {
        let embedder = &collaborators.embedder;
        if embedder.provider_name() != info.embedding_engine
            || embedder.model_name() != info.embedding_model
        {
            return Err(AppError::Config(format!(
                "Knowledge base '{}' uses {}/{} but the embedder is {}/{}",
                info.name,
                info.embedding_engine,
                info.embedding_model,
                embedder.provider_name(),
                embedder.model_name()
            )));
        }

        Ok(Self {
            info,
            storage_dir: storage_dir.into(),
            config: RwLock::new(config),
            loader: collaborators.loader,
            splitter: collaborators.splitter,
            embedder: collaborators.embedder,
            backend: collaborators.backend,
            write_guard: Mutex::new(()),
            store: Mutex::new(None),
            documents: RwLock::new(Vec::new()),
        })
    }

    pub fn info(&self) -> &BaseInfo {
        &self.info
    }

    pub fn id(&self) -> &str {
        &self.info.uuid
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Current settings.
    pub async fn config(&self) -> RagConfig {
        self.config.read().await.clone()
    }

    /// Replace the settings used by later operations.
    pub async fn set_config(&self, config: RagConfig) {
        *self.config.write().await = config;
    }

    /// Snapshot of the registry, in insertion order.
    pub async fn documents(&self) -> Vec<DocumentSource> {
        self.documents.read().await.clone()
    }

    /// Look up a top-level source.
    pub async fn document(&self, id: &str) -> Option<DocumentSource> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| d.uuid == id)
            .cloned()
    }

    /// Replace the registry with previously persisted sources.
    pub async fn restore(&self, documents: Vec<DocumentSource>) {
        *self.documents.write().await = documents;
    }

    /// Initialise empty storage for this base.
    pub async fn create(&self) -> AppResult<()> {
        let _guard = self.write_guard.lock().await;

        tokio::fs::create_dir_all(&self.storage_dir).await?;
        self.backend.create(&self.storage_dir).await?;

        info!(
            "Created knowledge base '{}' ({}) with {} store",
            self.info.name,
            self.info.uuid,
            self.backend.name()
        );
        Ok(())
    }

    /// Open the store handle if it is not open yet.
    pub async fn connect(&self) -> AppResult<()> {
        self.open_store().await.map(|_| ())
    }

    /// Remove the base's storage and forget its documents.
    ///
    /// Storage removal failures are logged and otherwise ignored.
    pub async fn destroy(&self) {
        let _guard = self.write_guard.lock().await;

        *self.store.lock().await = None;
        if let Err(e) = self.backend.destroy(&self.storage_dir).await {
            warn!(
                "Failed to remove storage of knowledge base '{}' at {:?}: {}",
                self.info.name, self.storage_dir, e
            );
        }
        self.documents.write().await.clear();

        info!("Destroyed knowledge base '{}'", self.info.name);
    }

    /// Ingest a source under `id`, replacing any source with the same id.
    pub async fn add(
        &self,
        id: &str,
        kind: SourceKind,
        origin: &str,
        progress: &ProgressReporter,
    ) -> AppResult<String> {
        self.add_with_options(id, kind, origin, &IngestOptions::default(), progress)
            .await
    }

    /// [`add`](Self::add) with per-call overrides.
    pub async fn add_with_options(
        &self,
        id: &str,
        kind: SourceKind,
        origin: &str,
        options: &IngestOptions,
        progress: &ProgressReporter,
    ) -> AppResult<String> {
        let _guard = self.write_guard.lock().await;
        self.replace_existing(id).await?;

        if kind == SourceKind::Folder {
            self.add_folder_locked(id, origin, options, progress).await?;
        } else {
            let mut source = DocumentSource::new(id, kind, origin);
            self.add_document(&mut source, options, Some(progress)).await?;
            self.documents.write().await.push(source);
        }

        Ok(id.to_string())
    }

    /// Ingest every file under `origin` as children of folder `id`.
    ///
    /// Files that fail are skipped and listed in the report.
    pub async fn add_folder(
        &self,
        id: &str,
        origin: &str,
        options: &IngestOptions,
        progress: &ProgressReporter,
    ) -> AppResult<FolderIngestReport> {
        let _guard = self.write_guard.lock().await;
        self.replace_existing(id).await?;
        self.add_folder_locked(id, origin, options, progress).await
    }

    /// Remove a source and all of its chunk records.
    pub async fn delete(&self, id: &str, progress: &ProgressReporter) -> AppResult<()> {
        let _guard = self.write_guard.lock().await;
        self.delete_locked(id, progress).await
    }

    /// Chunks most similar to `text`, best first.
    ///
    /// Only results scoring strictly above the relevance cutoff are kept, at
    /// most `search_result_count` of them.
    pub async fn query(&self, text: &str) -> AppResult<Vec<QueryResult>> {
        let config = self.config().await;
        let vector = self.embedder.embed(text).await?;

        let requested = config.search_result_count + config.query_oversample;
        let hits = {
            let mut slot = self.open_store().await?;
            let store = connected(&mut slot)?;
            store.query(text, &vector, requested).await?
        };

        let raw = hits.len();
        let results: Vec<QueryResult> = hits
            .into_iter()
            .filter(|hit| hit.score > config.relevance_cut_off)
            .map(|hit| QueryResult {
                content: hit.chunk.content,
                score: hit.score,
                metadata: hit.chunk.metadata,
            })
            .take(config.search_result_count)
            .collect();

        debug!(
            "Query on '{}' kept {} of {} neighbours (cutoff {})",
            self.info.name,
            results.len(),
            raw,
            config.relevance_cut_off
        );
        Ok(results)
    }

    async fn open_store(&self) -> AppResult<MutexGuard<'_, StoreSlot>> {
        let mut slot = self.store.lock().await;
        if slot.is_none() {
            let store = self.backend.connect(&self.storage_dir).await?;
            debug!("Connected to store of knowledge base '{}'", self.info.name);
            *slot = Some(store);
        }
        Ok(slot)
    }

    /// Delete a source with the same id, silently.
    async fn replace_existing(&self, id: &str) -> AppResult<()> {
        if self.document(id).await.is_some() {
            debug!("Replacing existing source {}", id);
            self.delete_locked(id, &ProgressReporter::noop()).await?;
        }
        Ok(())
    }

    async fn add_folder_locked(
        &self,
        id: &str,
        origin: &str,
        options: &IngestOptions,
        progress: &ProgressReporter,
    ) -> AppResult<FolderIngestReport> {
        let root = Path::new(origin);
        if !root.is_dir() {
            return Err(AppError::LoadFailed(format!("{} is not a directory", origin)));
        }
        self.connect().await?;

        self.documents
            .write()
            .await
            .push(DocumentSource::new(id, SourceKind::Folder, origin));
        progress.registered(id, origin).await;

        let files = discover_files(root);
        let total = files.len();
        info!("Ingesting {} files from {}", total, origin);

        let mut report = FolderIngestReport {
            folder_id: id.to_string(),
            ..Default::default()
        };

        for path in files {
            let child_id = uuid::Uuid::new_v4().to_string();
            let child_origin = path.to_string_lossy().to_string();
            let mut child = DocumentSource::new(&child_id, SourceKind::File, &child_origin);

            match self.add_document(&mut child, options, None).await {
                Ok(_) => {
                    self.push_child(id, child).await;
                    report.succeeded.push(child_id);

                    if report.succeeded.len() % FOLDER_PROGRESS_EVERY == 0 {
                        progress
                            .folder_progress(id, report.succeeded.len(), total)
                            .await;
                    }
                }
                Err(e) => {
                    warn!("Skipping {:?}: {}", path, e);
                    report.failed.push(FailedFile {
                        path,
                        source_id: child_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        progress
            .folder_complete(id, report.succeeded.len(), report.failed.len())
            .await;
        info!(
            "Folder {}: {} files stored, {} failed",
            origin,
            report.succeeded.len(),
            report.failed.len()
        );

        Ok(report)
    }

    async fn push_child(&self, folder_id: &str, child: DocumentSource) {
        let mut documents = self.documents.write().await;
        if let Some(folder) = documents.iter_mut().find(|d| d.uuid == folder_id) {
            folder.items.push(child);
        }
    }

    /// Load, split, embed and store one document under its own id.
    ///
    /// Returns the number of stored chunks.
    async fn add_document(
        &self,
        source: &mut DocumentSource,
        options: &IngestOptions,
        progress: Option<&ProgressReporter>,
    ) -> AppResult<usize> {
        let config = self.config().await;
        self.connect().await?;

        if !self.loader.is_parseable(source.kind, &source.origin) {
            return Err(AppError::UnsupportedSource(format!(
                "{} ({})",
                source.origin, source.kind
            )));
        }

        let text = self.loader.load(source.kind, &source.origin).await?;
        if text.is_empty() {
            return Err(AppError::LoadFailed(format!(
                "no text extracted from {}",
                source.origin
            )));
        }

        let max_mb = options
            .max_document_size_mb
            .unwrap_or(config.max_document_size_mb);
        if text.len() as f64 > max_mb * 1024.0 * 1024.0 {
            return Err(AppError::DocumentTooLarge { max_mb });
        }

        if source.kind == SourceKind::Url {
            source.title = extract_title(&text);
        }

        let chunks = self.splitter.split(&text)?;
        let plan = BatchPlan::new(chunks.len(), self.splitter.chunk_size(), &config);
        let metadata = source.chunk_metadata();

        debug!(
            "Storing {} chunks of {} in {} batches of {}",
            chunks.len(),
            source.uuid,
            plan.batch_count,
            plan.batch_size
        );

        let mut slot = self.open_store().await?;
        let store = connected(&mut slot)?;

        store.begin_transaction().await?;
        let mut committed = 0usize;
        let written = self
            .write_chunks(store, &source.uuid, &chunks, &metadata, &plan, &mut committed)
            .await;

        let result = match written {
            Ok(count) => store.commit_transaction().await.map(|_| count),
            Err(e) => Err(e),
        };

        match result {
            Ok(count) => {
                drop(slot);
                if let Some(progress) = progress {
                    progress.document_stored(&source.uuid, count).await;
                }
                Ok(count)
            }
            Err(e) => {
                discard_partial(store, &source.uuid, committed).await;
                Err(e)
            }
        }
    }

    /// Embed batches in order and insert every chunk, committing every
    /// `INSERT_COMMIT_EVERY` records.
    async fn write_chunks(
        &self,
        store: &mut dyn VectorStore,
        group_id: &str,
        chunks: &[String],
        metadata: &ChunkMetadata,
        plan: &BatchPlan,
        committed: &mut usize,
    ) -> AppResult<usize> {
        let mut inserted = 0usize;

        for (index, batch) in chunks.chunks(plan.batch_size).enumerate() {
            let vectors = self.embedder.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "{} returned {} vectors for {} chunks",
                    self.embedder.provider_name(),
                    vectors.len(),
                    batch.len()
                )));
            }

            for (content, vector) in batch.iter().zip(vectors.iter()) {
                store.insert(group_id, content, vector, metadata).await?;
                inserted += 1;

                if inserted % INSERT_COMMIT_EVERY == 0 {
                    store.commit_transaction().await?;
                    *committed = inserted;
                    store.begin_transaction().await?;
                }
            }

            if plan.should_log(index) {
                debug!(
                    "Embedded batch {}/{} of {}",
                    index + 1,
                    plan.batch_count,
                    group_id
                );
            }
        }

        Ok(inserted)
    }

    async fn delete_locked(&self, id: &str, progress: &ProgressReporter) -> AppResult<()> {
        let source = self
            .document(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;

        let groups = source.group_ids();
        let has_children = !source.items.is_empty();
        let total = groups.len();

        let mut slot = self.open_store().await?;
        let store = connected(&mut slot)?;

        store.begin_transaction().await?;
        let deleted = async {
            self.delete_groups(store, id, &groups, has_children, progress)
                .await?;
            store.commit_transaction().await
        }
        .await;

        if let Err(e) = deleted {
            if let Err(rollback) = store.rollback_transaction().await {
                warn!("Rollback after failed delete of {} failed: {}", id, rollback);
            }
            return Err(e);
        }

        self.documents.write().await.retain(|d| d.uuid != id);
        drop(slot);

        progress.delete_complete(id, total).await;
        info!("Deleted source {} ({} groups)", id, total);
        Ok(())
    }

    /// Delete every group, committing every `DELETE_COMMIT_EVERY` children.
    ///
    /// Children leave the folder's item list once their deletion is
    /// committed; the final commit is left to the caller.
    async fn delete_groups(
        &self,
        store: &mut dyn VectorStore,
        id: &str,
        groups: &[String],
        has_children: bool,
        progress: &ProgressReporter,
    ) -> AppResult<()> {
        let total = groups.len();

        for (index, group_id) in groups.iter().enumerate() {
            store.delete(group_id).await?;

            let deleted = index + 1;
            if has_children && deleted % DELETE_COMMIT_EVERY == 0 {
                store.commit_transaction().await?;
                self.forget_children(id, &groups[..deleted]).await;
                progress.delete_progress(id, deleted, total).await;
                store.begin_transaction().await?;
            }
        }

        Ok(())
    }

    async fn forget_children(&self, folder_id: &str, child_ids: &[String]) {
        let mut documents = self.documents.write().await;
        if let Some(folder) = documents.iter_mut().find(|d| d.uuid == folder_id) {
            folder.items.retain(|item| !child_ids.contains(&item.uuid));
        }
    }
}

fn connected<'a>(slot: &'a mut StoreSlot) -> AppResult<&'a mut dyn VectorStore> {
    match slot {
        Some(store) => Ok(store.as_mut()),
        None => Err(AppError::Storage("Store is not connected".to_string())),
    }
}

/// Roll back after a failed ingestion and remove records already committed.
async fn discard_partial(store: &mut dyn VectorStore, group_id: &str, committed: usize) {
    if let Err(e) = store.rollback_transaction().await {
        warn!("Rollback of {} failed: {}", group_id, e);
    }
    if committed == 0 {
        return;
    }

    let cleanup = async {
        store.begin_transaction().await?;
        store.delete(group_id).await?;
        store.commit_transaction().await
    };
    match cleanup.await {
        Ok(()) => debug!("Removed {} committed records of {}", committed, group_id),
        Err(e) => warn!(
            "Failed to remove {} committed records of {}: {}",
            committed, group_id, e
        ),
    }
}

/// Files under `root`, depth first, sorted by file name. Symlinks are not
/// followed; unreadable entries are logged and skipped.
fn discover_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}
