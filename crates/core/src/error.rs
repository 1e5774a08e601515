//! Error types for docbase.
//!
//! This module defines a unified error enum that covers every error category
//! in the workspace: configuration, I/O, document ingestion, embedding and
//! vector storage.

use thiserror::Error;

/// Unified error type for docbase.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Knowledge base errors that fit no narrower category
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// The loader cannot extract text from this kind of source
    #[error("Unsupported document type: {0}")]
    UnsupportedSource(String),

    /// The loader ran but produced no usable text
    #[error("Unable to load document: {0}")]
    LoadFailed(String),

    /// Extracted text exceeds the configured size cap
    #[error("Document is too large (max {max_mb}MB)")]
    DocumentTooLarge { max_mb: f64 },

    /// A document source or knowledge base does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
