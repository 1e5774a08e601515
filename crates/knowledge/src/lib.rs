//! Knowledge base ingestion and retrieval.
//!
//! Turns files, web pages, raw text and whole folders into a locally
//! queryable semantic index, and answers similarity queries against it.

pub mod batching;
pub mod chunk;
pub mod config;
pub mod embeddings;
pub mod knowledge_base;
pub mod loader;
pub mod office;
pub mod progress;
pub mod repository;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use knowledge_base::{BaseInfo, Collaborators, KnowledgeBase};
pub use progress::{ProgressCallback, ProgressEvent, ProgressPhase, ProgressReporter};
pub use repository::{CollaboratorFactory, DocumentRepository};
pub use types::{
    BaseSummary, ChunkMetadata, DocumentSource, FailedFile, FolderIngestReport, IngestOptions,
    QueryResult, SourceKind,
};
