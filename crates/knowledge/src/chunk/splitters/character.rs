//! Character-window splitter with overlap.

use crate::chunk::Splitter;
use docbase_core::{AppError, AppResult};

/// Cuts text into windows of at most `chunk_size` characters.
///
/// A window is shortened to the last whitespace inside it when one exists,
/// and the next window starts `overlap` characters before the previous end.
#[derive(Debug, Clone)]
pub struct CharacterSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl CharacterSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config("chunk size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

impl Splitter for CharacterSplitter {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn split(&self, text: &str) -> AppResult<Vec<String>> {
        // Byte offset of every char, plus the end of the text.
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = offsets.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < char_count {
            let mut end = (start + self.chunk_size).min(char_count);

            if end < char_count {
                let window = &text[offsets[start]..offsets[end]];
                if let Some(space) = window.rfind(char::is_whitespace) {
                    let space_char = window[..space].chars().count();
                    if space_char > self.overlap {
                        end = start + space_char;
                    }
                }
            }

            let chunk = text[offsets[start]..offsets[end]].trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end == char_count {
                break;
            }
            start = end - self.overlap;
        }

        tracing::debug!(
            "Character splitter created {} chunks from {} bytes",
            chunks.len(),
            text.len()
        );

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_splitter_basic() {
        let splitter = CharacterSplitter::new(100, 20).unwrap();
        let text = "word ".repeat(200);

        let chunks = splitter.split(&text).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_character_splitter_utf8() {
        let splitter = CharacterSplitter::new(30, 5).unwrap();
        let text = "Gamedex é um aplicativo 🎮 brasileiro com acentuação: ã, õ, ç. ".repeat(10);

        let chunks = splitter.split(&text).unwrap();
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30);
        }
    }

    #[test]
    fn test_character_splitter_covers_text_without_whitespace() {
        let splitter = CharacterSplitter::new(10, 2).unwrap();
        let text = "a".repeat(27);

        let chunks = splitter.split(&text).unwrap();
        // windows start at 0, 8, 16, 24
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[3].len(), 3);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = CharacterSplitter::new(100, 10).unwrap();
        assert_eq!(splitter.split(" hello ").unwrap(), vec!["hello".to_string()]);
        assert!(splitter.split("").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(CharacterSplitter::new(0, 0).is_err());
        assert!(CharacterSplitter::new(10, 10).is_err());
    }
}
