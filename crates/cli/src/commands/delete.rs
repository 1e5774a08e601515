//! Source removal.

use clap::Args;
use docbase_core::{config::AppConfig, AppResult};

/// Remove a source and all of its chunks from a knowledge base
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Knowledge base id or name
    pub base: String,

    /// Source id
    pub source_id: String,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Deleting source {} from '{}'", self.source_id, self.base);

        let repo = super::open_repository(config).await?;
        let base = repo.base(&self.base).await?;
        let result = base.delete(&self.source_id, &super::stderr_progress()).await;
        repo.save().await?;
        result?;

        println!("Deleted {}", self.source_id);
        Ok(())
    }
}
