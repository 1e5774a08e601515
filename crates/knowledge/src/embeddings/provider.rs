//! Embedding provider trait and factory.

use docbase_core::{AppError, AppResult};
use std::sync::Arc;

use super::providers::{MockProvider, OllamaProvider, OpenAiProvider};

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions, when known before the first request
    fn dimensions(&self) -> Option<usize>;

    /// Generate embeddings for multiple texts in a batch.
    ///
    /// Returns one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider for an engine/model pair.
pub fn create_provider(engine: &str, model: &str) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match engine {
        "mock" => Ok(Arc::new(MockProvider::with_model(
            model,
            MockProvider::DEFAULT_DIMENSIONS,
        ))),

        "ollama" => Ok(Arc::new(OllamaProvider::from_env(model)?)),

        "openai" => Ok(Arc::new(OpenAiProvider::from_env(model)?)),

        _ => Err(AppError::Config(format!(
            "Unknown embedding engine: '{}'. Supported engines: mock, ollama, openai",
            engine
        ))),
    }
}
