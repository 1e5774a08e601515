//! Mock embedding provider using hashed word and trigram features.

use crate::embeddings::provider::EmbeddingProvider;
use docbase_core::AppResult;

/// Mock provider for testing and offline use.
///
/// Vectors are deterministic and content-dependent: texts sharing words
/// score higher than unrelated texts, which is enough for ranking tests.
#[derive(Debug)]
pub struct MockProvider {
    model: String,
    dimensions: usize,
}

impl MockProvider {
    /// Dimensions used when a base is created with the mock engine.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Create a new mock provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self::with_model("trigram-v1", dimensions)
    }

    /// Create a mock provider reporting a custom model name.
    pub fn with_model(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions: dimensions.max(1),
        }
    }

    /// Hash word and trigram features of `text` into a unit vector.
    fn generate_mock_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2)
        {
            embedding[self.bucket(word)] += 1.0;

            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.bucket(&trigram)] += 0.5;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }

    /// FNV-1a bucket for a feature.
    fn bucket(&self, feature: &str) -> usize {
        let hash = feature.bytes().fold(0xcbf29ce484222325u64, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x100000001b3)
        });
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_mock_embedding(text))
            .collect())
    }
}
