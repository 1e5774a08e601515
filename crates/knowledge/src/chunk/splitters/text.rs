//! Semantic splitter using the text-splitter crate.

use crate::chunk::Splitter;
use docbase_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter as ExternalTextSplitter};

/// Splits on the largest semantic unit (paragraph, sentence, word) that fits.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Create a splitter, rejecting an overlap that is not below the size.
    pub fn new(chunk_size: usize, overlap: usize) -> AppResult<Self> {
        Self::chunk_config(chunk_size, overlap)?;
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    fn chunk_config(chunk_size: usize, overlap: usize) -> AppResult<ChunkConfig<text_splitter::Characters>> {
        if chunk_size == 0 {
            return Err(AppError::Config("chunk size must be positive".to_string()));
        }
        ChunkConfig::new(chunk_size)
            .with_overlap(overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk config: {}", e)))
    }
}

impl Splitter for TextSplitter {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn split(&self, text: &str) -> AppResult<Vec<String>> {
        let splitter = ExternalTextSplitter::new(Self::chunk_config(self.chunk_size, self.overlap)?);

        let chunks: Vec<String> = splitter
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(str::to_string)
            .collect();

        tracing::debug!(
            "Text splitter created {} chunks from {} bytes",
            chunks.len(),
            text.len()
        );

        Ok(chunks)
    }
}
