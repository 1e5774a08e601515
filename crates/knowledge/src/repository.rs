//! Workspace-level registry of knowledge bases.
//!
//! The repository persists every base's identity and document tree to
//! `.docbase/docrepo.json` so the registry survives restarts. Chunk records
//! live in each base's store directory under `.docbase/bases/<id>/`.

use crate::config::{get_base_dir, get_manifest_path};
use crate::knowledge_base::{BaseInfo, Collaborators, KnowledgeBase};
use crate::store::create_backend;
use crate::types::{BaseSummary, DocumentSource};
use docbase_core::{AppError, AppResult, RagConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Builds collaborators for a base's engine/model pair.
pub type CollaboratorFactory =
    Arc<dyn Fn(&BaseInfo, &RagConfig) -> AppResult<Collaborators> + Send + Sync>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    bases: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestEntry {
    #[serde(flatten)]
    info: BaseInfo,
    #[serde(default)]
    documents: Vec<DocumentSource>,
}

/// One manifest entry; the base itself is built on first use.
struct BaseSlot {
    info: BaseInfo,
    restored: Vec<DocumentSource>,
    base: OnceCell<Arc<KnowledgeBase>>,
}

impl BaseSlot {
    fn built(base: KnowledgeBase) -> Self {
        Self {
            info: base.info().clone(),
            restored: Vec::new(),
            base: OnceCell::new_with(Some(Arc::new(base))),
        }
    }

    async fn documents(&self) -> Vec<DocumentSource> {
        match self.base.get() {
            Some(base) => base.documents().await,
            None => self.restored.clone(),
        }
    }
}

/// All knowledge bases of a workspace.
///
/// Opening reads the manifest only. A base's collaborators are built the
/// first time it is looked up, so a base with a broken embedder setup does
/// not affect the others.
pub struct DocumentRepository {
    workspace: PathBuf,
    config: RagConfig,
    factory: CollaboratorFactory,
    bases: Vec<BaseSlot>,
}

impl DocumentRepository {
    /// Open the repository with the default collaborators.
    pub async fn open(workspace: &Path, config: RagConfig) -> AppResult<Self> {
        let factory: CollaboratorFactory = Arc::new(|info: &BaseInfo, config: &RagConfig| {
            Collaborators::from_config(&info.embedding_engine, &info.embedding_model, config)
        });
        Self::open_with(workspace, config, factory).await
    }

    /// Open the repository, building each base's collaborators with `factory`.
    pub async fn open_with(
        workspace: &Path,
        config: RagConfig,
        factory: CollaboratorFactory,
    ) -> AppResult<Self> {
        let mut repo = Self {
            workspace: workspace.to_path_buf(),
            config,
            factory,
            bases: Vec::new(),
        };

        let manifest_path = get_manifest_path(workspace);
        if !manifest_path.exists() {
            tracing::debug!("No document repository at {:?}", manifest_path);
            return Ok(repo);
        }

        let contents = tokio::fs::read_to_string(&manifest_path).await.map_err(|e| {
            AppError::Knowledge(format!("Failed to read {:?}: {}", manifest_path, e))
        })?;
        let manifest: Manifest = serde_json::from_str(&contents).map_err(|e| {
            AppError::Knowledge(format!("Failed to parse {:?}: {}", manifest_path, e))
        })?;

        repo.bases = manifest
            .bases
            .into_iter()
            .map(|entry| BaseSlot {
                info: entry.info,
                restored: entry.documents,
                base: OnceCell::new(),
            })
            .collect();

        tracing::debug!("Loaded {} knowledge bases", repo.bases.len());
        Ok(repo)
    }

    fn build(&self, info: BaseInfo) -> AppResult<KnowledgeBase> {
        let collaborators = (self.factory)(&info, &self.config)?;
        let dir = get_base_dir(&self.workspace, &info.uuid);
        KnowledgeBase::new(info, dir, self.config.clone(), collaborators)
    }

    fn slot(&self, id_or_name: &str) -> AppResult<&BaseSlot> {
        self.bases
            .iter()
            .find(|slot| slot.info.uuid == id_or_name)
            .or_else(|| self.bases.iter().find(|slot| slot.info.name == id_or_name))
            .ok_or_else(|| AppError::NotFound(format!("Knowledge base {} not found", id_or_name)))
    }

    /// Create a base with a fresh id and empty storage.
    pub async fn create_base(&mut self, name: &str, engine: &str, model: &str) -> AppResult<String> {
        let info = BaseInfo {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            embedding_engine: engine.to_string(),
            embedding_model: model.to_string(),
        };
        let id = info.uuid.clone();

        let base = self.build(info)?;
        base.create().await?;
        self.bases.push(BaseSlot::built(base));
        self.save().await?;

        Ok(id)
    }

    /// Look up a base by id, or by name when no id matches.
    ///
    /// Builds the base's collaborators on first use and fails with their
    /// error if they cannot be built.
    pub async fn base(&self, id_or_name: &str) -> AppResult<Arc<KnowledgeBase>> {
        let slot = self.slot(id_or_name)?;
        let base = slot
            .base
            .get_or_try_init(|| async {
                let base = self.build(slot.info.clone())?;
                base.restore(slot.restored.clone()).await;
                Ok::<_, AppError>(Arc::new(base))
            })
            .await?;
        Ok(base.clone())
    }

    /// Summaries of every base, in creation order.
    pub async fn list(&self) -> Vec<BaseSummary> {
        let mut summaries = Vec::with_capacity(self.bases.len());
        for slot in &self.bases {
            let info = &slot.info;
            summaries.push(BaseSummary {
                uuid: info.uuid.clone(),
                name: info.name.clone(),
                embedding_engine: info.embedding_engine.clone(),
                embedding_model: info.embedding_model.clone(),
                document_count: slot.documents().await.len(),
            });
        }
        summaries
    }

    /// Destroy a base's storage and drop it from the manifest.
    ///
    /// A base whose collaborators cannot be built still has its storage
    /// directory removed through the configured store backend.
    pub async fn delete_base(&mut self, id_or_name: &str) -> AppResult<()> {
        let id = self.slot(id_or_name)?.info.uuid.clone();

        match self.base(&id).await {
            Ok(base) => base.destroy().await,
            Err(e) => {
                tracing::warn!("Deleting knowledge base {} without its collaborators: {}", id, e);
                let dir = get_base_dir(&self.workspace, &id);
                let removed = match create_backend(&self.config.store_backend) {
                    Ok(backend) => backend.destroy(&dir).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = removed {
                    tracing::warn!("Failed to remove storage at {:?}: {}", dir, e);
                }
            }
        }

        self.bases.retain(|slot| slot.info.uuid != id);
        self.save().await
    }

    /// Write the manifest atomically (temp file, then rename).
    pub async fn save(&self) -> AppResult<()> {
        let mut manifest = Manifest::default();
        for slot in &self.bases {
            manifest.bases.push(ManifestEntry {
                info: slot.info.clone(),
                documents: slot.documents().await,
            });
        }

        let path = get_manifest_path(&self.workspace);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&manifest)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            AppError::Knowledge(format!("Failed to write {:?}: {}", tmp, e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            AppError::Knowledge(format!("Failed to replace {:?}: {}", path, e))
        })?;

        tracing::debug!("Saved {} knowledge bases to {:?}", self.bases.len(), path);
        Ok(())
    }
}
