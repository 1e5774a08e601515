//! Command handlers for the docbase CLI.

pub mod add;
pub mod base;
pub mod delete;
pub mod docs;
pub mod query;

pub use add::AddCommand;
pub use base::BaseCommand;
pub use delete::DeleteCommand;
pub use docs::DocsCommand;
pub use query::QueryCommand;

use docbase_core::{config::AppConfig, AppResult};
use docbase_knowledge::{DocumentRepository, ProgressReporter};
use std::sync::Arc;

/// Open the workspace's document repository.
pub(crate) async fn open_repository(config: &AppConfig) -> AppResult<DocumentRepository> {
    DocumentRepository::open(&config.workspace, config.rag.clone()).await
}

/// Reporter printing every event on stderr.
pub(crate) fn stderr_progress() -> ProgressReporter {
    ProgressReporter::new(Arc::new(|event| eprintln!("{}", event.format_simple())))
}
