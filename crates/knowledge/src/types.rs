//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use docbase_core::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of an ingested unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Url,
    Text,
    Folder,
}

impl SourceKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Url => "url",
            Self::Text => "text",
            Self::Folder => "folder",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "url" => Ok(Self::Url),
            "text" => Ok(Self::Text),
            "folder" => Ok(Self::Folder),
            other => Err(AppError::UnsupportedSource(format!(
                "unknown source kind '{}'",
                other
            ))),
        }
    }
}

/// One ingested unit tracked in a knowledge base registry.
///
/// A folder owns one child per file discovered under it. For every other
/// kind, the source id doubles as the group id of its chunk records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSource {
    /// Unique source identifier
    pub uuid: String,

    /// Source kind
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Path, URL or literal text
    pub origin: String,

    /// Display title (web page title for URLs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// When the source was registered
    pub added_at: DateTime<Utc>,

    /// Children of a folder source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<DocumentSource>,
}

impl DocumentSource {
    /// Create a new source with no title and no children.
    pub fn new(uuid: impl Into<String>, kind: SourceKind, origin: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            kind,
            origin: origin.into(),
            title: None,
            added_at: Utc::now(),
            items: Vec::new(),
        }
    }

    /// Title for display and chunk metadata, falling back to the origin.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.origin)
    }

    /// Group identifiers under which this source's chunks are stored.
    pub fn group_ids(&self) -> Vec<String> {
        if self.items.is_empty() {
            vec![self.uuid.clone()]
        } else {
            self.items.iter().map(|item| item.uuid.clone()).collect()
        }
    }

    /// Metadata written next to every chunk of this source.
    pub fn chunk_metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            uuid: self.uuid.clone(),
            kind: self.kind,
            title: self.title().to_string(),
            url: self.origin.clone(),
        }
    }
}

/// Metadata stored with each chunk record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Owning source identifier
    pub uuid: String,

    /// Owning source kind
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Source title (origin when untitled)
    pub title: String,

    /// Source origin
    pub url: String,
}

/// A chunk record as returned by a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Group identifier the record was inserted under
    pub group_id: String,

    /// Chunk text
    pub content: String,

    /// Metadata recorded at insert time
    pub metadata: ChunkMetadata,
}

/// A nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    pub score: f32,
}

/// Result of a knowledge base query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Chunk text
    pub content: String,

    /// Similarity score
    pub score: f32,

    /// Metadata recorded at insert time
    pub metadata: ChunkMetadata,
}

/// Per-call ingestion overrides.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Size cap override in megabytes
    pub max_document_size_mb: Option<f64>,
}

/// A file that could not be ingested during folder ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub source_id: String,
    pub reason: String,
}

/// Outcome of a folder ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderIngestReport {
    /// Folder source identifier
    pub folder_id: String,

    /// Identifiers of children that were stored
    pub succeeded: Vec<String>,

    /// Files that failed, with the reason
    pub failed: Vec<FailedFile>,
}

/// Summary of a knowledge base for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseSummary {
    pub uuid: String,
    pub name: String,
    pub embedding_engine: String,
    pub embedding_model: String,
    pub document_count: usize,
}
