//! Knowledge base management.

use clap::{Args, Subcommand};
use docbase_core::{config::AppConfig, AppResult};

/// Create, list and delete knowledge bases
#[derive(Args, Debug)]
pub struct BaseCommand {
    #[command(subcommand)]
    pub action: BaseAction,
}

#[derive(Subcommand, Debug)]
pub enum BaseAction {
    /// Create an empty knowledge base
    Create(BaseCreateCommand),
    /// List knowledge bases
    List(BaseListCommand),
    /// Delete a knowledge base and its storage
    Delete(BaseDeleteCommand),
}

#[derive(Args, Debug)]
pub struct BaseCreateCommand {
    /// Knowledge base name
    pub name: String,

    /// Embedding engine (mock, ollama, openai); defaults to the configured engine
    #[arg(long)]
    pub engine: Option<String>,

    /// Embedding model; defaults to the configured model
    #[arg(long)]
    pub model: Option<String>,
}

impl BaseCreateCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let engine = self.engine.as_deref().unwrap_or(&config.rag.embedding_engine);
        let model = self.model.as_deref().unwrap_or(&config.rag.embedding_model);
        tracing::info!("Creating knowledge base '{}' ({}/{})", self.name, engine, model);

        let mut repo = super::open_repository(config).await?;
        let id = repo.create_base(&self.name, engine, model).await?;

        println!("{}", id);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct BaseListCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BaseListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let repo = super::open_repository(config).await?;
        let bases = repo.list().await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&bases)?);
            return Ok(());
        }

        if bases.is_empty() {
            println!("No knowledge bases");
        }
        for base in bases {
            println!(
                "{}  {}  {}/{}  {} documents",
                base.uuid, base.name, base.embedding_engine, base.embedding_model, base.document_count
            );
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct BaseDeleteCommand {
    /// Knowledge base id or name
    pub base: String,
}

impl BaseDeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Deleting knowledge base '{}'", self.base);

        let mut repo = super::open_repository(config).await?;
        repo.delete_base(&self.base).await?;

        println!("Knowledge base '{}' deleted", self.base);
        Ok(())
    }
}

impl BaseCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            BaseAction::Create(cmd) => cmd.execute(config).await,
            BaseAction::List(cmd) => cmd.execute(config).await,
            BaseAction::Delete(cmd) => cmd.execute(config).await,
        }
    }
}
