//! OpenAI-compatible embedding provider (`POST /v1/embeddings`).

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use docbase_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Known OpenAI embedding models and their dimensions
const EMBEDDING_MODELS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
];

/// OpenAI embedding provider
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    auth_header: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    /// Create a provider with an explicit key and base URL.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Embedding(format!("Failed to create HTTP client for OpenAI: {}", e))
            })?;

        Ok(Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Create a provider from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env(model: impl Into<String>) -> AppResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AppError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        Self::new(api_key, base_url, model)
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }
}

/// Order vectors by their `index` field and check the count.
fn parse_response(body: &str, expected: usize) -> AppResult<Vec<Vec<f32>>> {
    let mut response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Embedding(format!("Failed to parse embedding response: {}", e)))?;

    if response.data.len() != expected {
        return Err(AppError::Embedding(format!(
            "OpenAI returned {} embeddings for {} inputs",
            response.data.len(),
            expected
        )));
    }

    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        EMBEDDING_MODELS
            .iter()
            .find(|(name, _)| *name == self.model)
            .map(|(_, dims)| *dims)
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "openai", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = self.embeddings_url();
        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.auth_header)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to send request to OpenAI: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to read OpenAI response: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Embedding(format!(
                "OpenAI API error ({}): {}",
                status, body
            )));
        }

        parse_response(&body, texts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_orders_by_index() {
        let body = r#"{
            "model": "text-embedding-3-small",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.3, 0.4]},
                {"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}
            ],
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;

        let vectors = parse_response(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn test_parse_response_count_mismatch() {
        let body = r#"{"data": [{"index": 0, "embedding": [0.1]}]}"#;
        assert!(parse_response(body, 3).is_err());
    }

    #[test]
    fn test_known_dimensions() {
        let provider = OpenAiProvider::new("key", "http://localhost:8080/", "text-embedding-3-large").unwrap();
        assert_eq!(provider.dimensions(), Some(3072));
        assert_eq!(provider.embeddings_url(), "http://localhost:8080/v1/embeddings");

        let custom = OpenAiProvider::new("key", DEFAULT_OPENAI_BASE_URL, "custom").unwrap();
        assert_eq!(custom.dimensions(), None);
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = OpenAiProvider::new("sk-secret", DEFAULT_OPENAI_BASE_URL, "m").unwrap();
        assert!(!format!("{:?}", provider).contains("sk-secret"));
    }
}
