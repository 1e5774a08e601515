//! Source ingestion.

use clap::Args;
use docbase_core::{config::AppConfig, AppResult};
use docbase_knowledge::{IngestOptions, SourceKind};
use std::path::{Path, PathBuf};

/// Add a document source to a knowledge base
#[derive(Args, Debug)]
pub struct AddCommand {
    /// Knowledge base id or name
    pub base: String,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Source id; an existing source with this id is replaced
    #[arg(long)]
    pub id: Option<String>,

    /// Per-document size limit in megabytes
    #[arg(long)]
    pub max_size_mb: Option<f64>,

    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Exactly one source.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Local file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Web page
    #[arg(long)]
    pub url: Option<String>,

    /// Raw text
    #[arg(long)]
    pub text: Option<String>,

    /// Folder, ingested recursively
    #[arg(long)]
    pub folder: Option<PathBuf>,
}

impl SourceArgs {
    /// Kind and origin of the selected source. Paths are made absolute.
    pub fn resolve(&self) -> AppResult<(SourceKind, String)> {
        if let Some(path) = &self.file {
            return Ok((SourceKind::File, absolute(path)?));
        }
        if let Some(path) = &self.folder {
            return Ok((SourceKind::Folder, absolute(path)?));
        }
        if let Some(url) = &self.url {
            return Ok((SourceKind::Url, url.clone()));
        }
        match &self.text {
            Some(text) => Ok((SourceKind::Text, text.clone())),
            None => Err(docbase_core::AppError::Config(
                "one of --file, --url, --text or --folder is required".to_string(),
            )),
        }
    }
}

fn absolute(path: &Path) -> AppResult<String> {
    Ok(std::fs::canonicalize(path)?.to_string_lossy().to_string())
}

impl AddCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let (kind, origin) = self.source.resolve()?;
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tracing::info!("Adding {} source {} to '{}'", kind, id, self.base);

        let repo = super::open_repository(config).await?;
        let base = repo.base(&self.base).await?;
        let options = IngestOptions {
            max_document_size_mb: self.max_size_mb,
        };
        let progress = super::stderr_progress();

        let outcome = if kind == SourceKind::Folder {
            base.add_folder(&id, &origin, &options, &progress)
                .await
                .map(Some)
        } else {
            base.add_with_options(&id, kind, &origin, &options, &progress)
                .await
                .map(|_| None)
        };
        // Folder children that made it in stay registered even if the call failed
        repo.save().await?;

        match outcome? {
            Some(report) if self.json => println!("{}", serde_json::to_string_pretty(&report)?),
            Some(report) => {
                println!("{}", report.folder_id);
                println!("  stored: {}", report.succeeded.len());
                for failed in &report.failed {
                    println!("  failed: {} ({})", failed.path.display(), failed.reason);
                }
            }
            None if self.json => println!("{}", serde_json::json!({ "id": id })),
            None => println!("{}", id),
        }
        Ok(())
    }
}
