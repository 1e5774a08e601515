//! Configuration management for docbase.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.docbase/config.yaml)
//!
//! The configuration is workspace-centric, with all state stored in `.docbase/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docbase/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Ingestion and retrieval settings
    pub rag: RagConfig,
}

/// Ingestion and retrieval settings consumed by every knowledge base.
///
/// Keys use the camelCase spelling of the YAML config file. Missing keys
/// fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagConfig {
    /// Maximum extracted text size per document, in megabytes
    #[serde(rename = "maxDocumentSizeMB")]
    pub max_document_size_mb: f64,

    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Number of results returned by a query
    pub search_result_count: usize,

    /// Results must score strictly above this value
    pub relevance_cut_off: f32,

    /// Nominal number of chunks per embedding request
    pub embed_batch_size: usize,

    /// Token ceiling of the embedding model
    pub token_budget: usize,

    /// Fraction of the token ceiling a batch may use
    pub token_safety_factor: f64,

    /// Extra neighbours requested to absorb results dropped by the cutoff
    pub query_oversample: usize,

    /// Embedding engine for newly created bases
    pub embedding_engine: String,

    /// Embedding model for newly created bases
    pub embedding_model: String,

    /// Vector store backend: "sqlite", "lancedb" or "memory"
    pub store_backend: String,

    /// Chunk splitter: "text" or "character"
    pub splitter: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_document_size_mb: 16.0,
            chunk_size: 1000,
            chunk_overlap: 200,
            search_result_count: 5,
            relevance_cut_off: 0.2,
            embed_batch_size: 20,
            token_budget: 8192,
            token_safety_factor: 0.75,
            query_oversample: 10,
            embedding_engine: "ollama".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            store_backend: "sqlite".to_string(),
            splitter: "text".to_string(),
        }
    }
}

impl RagConfig {
    /// Reject settings the ingestion pipeline cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.max_document_size_mb <= 0.0 {
            return Err(AppError::Config(
                "maxDocumentSizeMB must be positive".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(AppError::Config(
                "embedBatchSize must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    rag: Option<RagConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            rag: RagConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, the YAML file and defaults.
    ///
    /// Environment variables:
    /// - `DOCBASE_WORKSPACE`: Override workspace path
    /// - `DOCBASE_CONFIG`: Path to config file
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("DOCBASE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCBASE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Path of the YAML config file (explicit or workspace default).
    pub fn config_path(&self) -> PathBuf {
        match self.config_file {
            Some(ref cf) => cf.clone(),
            None => self.docbase_dir().join("config.yaml"),
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(rag) = config_file.rag {
            rag.validate()?;
            result.rag = rag;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Re-read the YAML file after CLI overrides changed the workspace or file.
    pub fn reload_file(self) -> AppResult<Self> {
        let path = self.config_path();
        if path.exists() {
            self.merge_yaml(&path)
        } else {
            Ok(self)
        }
    }

    /// Get the path to the .docbase directory.
    pub fn docbase_dir(&self) -> PathBuf {
        self.workspace.join(".docbase")
    }

    /// Ensure the .docbase directory exists.
    pub fn ensure_docbase_dir(&self) -> AppResult<()> {
        let dir = self.docbase_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docbase directory: {}", e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert_eq!(config.rag, RagConfig::default());
    }

    #[test]
    fn test_rag_defaults() {
        let rag = RagConfig::default();
        assert_eq!(rag.max_document_size_mb, 16.0);
        assert_eq!(rag.search_result_count, 5);
        assert_eq!(rag.embed_batch_size, 20);
        assert_eq!(rag.query_oversample, 10);
        assert_eq!(rag.splitter, "text");
    }

    #[test]
    fn test_docbase_dir() {
        let config = AppConfig::default();
        assert!(config.docbase_dir().ends_with(".docbase"));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            Some(PathBuf::from("/tmp")),
            None,
            None,
            true,
            false,
        );

        assert_eq!(overridden.workspace, PathBuf::from("/tmp"));
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_partial_rag_section_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "rag:\n  maxDocumentSizeMB: 2\n  searchResultCount: 8\n  relevanceCutOff: 0.35\n",
        )
        .unwrap();

        let config = AppConfig {
            workspace: temp.path().to_path_buf(),
            config_file: Some(path.clone()),
            ..Default::default()
        };
        let merged = config.merge_yaml(&path).unwrap();

        assert_eq!(merged.rag.max_document_size_mb, 2.0);
        assert_eq!(merged.rag.search_result_count, 8);
        assert!((merged.rag.relevance_cut_off - 0.35).abs() < f32::EPSILON);
        assert_eq!(merged.rag.chunk_size, 1000);
        assert_eq!(merged.rag.store_backend, "sqlite");
    }

    #[test]
    fn test_invalid_rag_section_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "rag:\n  chunkSize: 100\n  chunkOverlap: 100\n").unwrap();

        let config = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..Default::default()
        };
        assert!(config.merge_yaml(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let rag = RagConfig {
            chunk_size: 0,
            chunk_overlap: 0,
            ..Default::default()
        };
        assert!(rag.validate().is_err());
        assert!(RagConfig::default().validate().is_ok());
    }
}
