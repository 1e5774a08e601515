//! Document tree listing.

use clap::Args;
use docbase_core::{config::AppConfig, AppResult};
use docbase_knowledge::DocumentSource;

/// List the sources of a knowledge base
#[derive(Args, Debug)]
pub struct DocsCommand {
    /// Knowledge base id or name
    pub base: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let repo = super::open_repository(config).await?;
        let documents = repo.base(&self.base).await?.documents().await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&documents)?);
            return Ok(());
        }

        if documents.is_empty() {
            println!("No documents");
        }
        for doc in &documents {
            for line in tree_lines(doc, 0) {
                println!("{}", line);
            }
        }
        Ok(())
    }
}

fn tree_lines(doc: &DocumentSource, depth: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{}  [{}] {}",
        "  ".repeat(depth),
        doc.uuid,
        doc.kind,
        doc.title()
    )];
    for item in &doc.items {
        lines.extend(tree_lines(item, depth + 1));
    }
    lines
}
