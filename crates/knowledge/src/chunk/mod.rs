//! Text chunking for ingestion.
//!
//! A [`Splitter`] cuts extracted document text into chunks of roughly
//! `chunk_size` characters. The knowledge base also reads the chunk size to
//! size its embedding batches.

pub mod splitters;

pub use splitters::{CharacterSplitter, TextSplitter};

use docbase_core::{AppError, AppResult, RagConfig};

/// Trait for chunk splitters.
pub trait Splitter: Send + Sync {
    /// Target chunk size in characters.
    fn chunk_size(&self) -> usize;

    /// Split text into chunks. Same input always yields the same chunks.
    fn split(&self, text: &str) -> AppResult<Vec<String>>;
}

/// Create a splitter by name using the configured size and overlap.
///
/// Known names: "text" (semantic boundaries) and "character".
pub fn create_splitter(name: &str, config: &RagConfig) -> AppResult<Box<dyn Splitter>> {
    match name {
        "text" => Ok(Box::new(TextSplitter::new(
            config.chunk_size,
            config.chunk_overlap,
        )?)),
        "character" => Ok(Box::new(CharacterSplitter::new(
            config.chunk_size,
            config.chunk_overlap,
        )?)),
        other => Err(AppError::Config(format!("Unknown splitter '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_splitter() {
        let config = RagConfig::default();
        assert_eq!(create_splitter("text", &config).unwrap().chunk_size(), 1000);
        assert_eq!(
            create_splitter("character", &config).unwrap().chunk_size(),
            1000
        );
        assert!(create_splitter("sentencepiece", &config).is_err());
    }
}
