//! Similarity search.

use clap::Args;
use docbase_core::{config::AppConfig, AppResult};

/// Find the chunks most similar to a question
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Knowledge base id or name
    pub base: String,

    /// Query text
    pub text: String,

    /// Number of results (defaults to searchResultCount)
    #[arg(short = 'k', long)]
    pub count: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Querying '{}'", self.base);

        let repo = super::open_repository(config).await?;
        let base = repo.base(&self.base).await?;
        if let Some(count) = self.count {
            let mut rag = base.config().await;
            rag.search_result_count = count;
            base.set_config(rag).await;
        }

        let results = base.query(&self.text).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }

        if results.is_empty() {
            println!("No relevant results");
        }
        for (i, result) in results.iter().enumerate() {
            println!(
                "{}. [{:.3}] {} ({})",
                i + 1,
                result.score,
                result.metadata.title,
                result.metadata.url
            );
            println!("   {}", result.content.replace('\n', " "));
        }
        Ok(())
    }
}
