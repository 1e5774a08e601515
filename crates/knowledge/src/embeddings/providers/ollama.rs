//! Ollama embedding provider.
//!
//! Calls the local Ollama batch endpoint (`POST /api/embed`) with every text
//! of a batch in one request. Failures are returned to the caller as-is; no
//! request is retried.

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use docbase_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default Ollama API base URL
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBED_ENDPOINT: &str = "/api/embed";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Ollama embedding provider using the local API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

/// Request payload for the Ollama batch embed API
#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from the Ollama batch embed API
#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Error response from the Ollama API
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a provider for `model` at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Embedding(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Create a provider using `OLLAMA_URL` or the default local address.
    pub fn from_env(model: impl Into<String>) -> AppResult<Self> {
        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        Self::new(base_url, model)
    }

    fn embed_url(&self) -> String {
        format!("{}{}", self.base_url, EMBED_ENDPOINT)
    }
}

/// Turn an Ollama response body into vectors, checking the count.
fn parse_embed_response(body: &str, expected: usize) -> AppResult<Vec<Vec<f32>>> {
    let response: EmbedResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Embedding(format!("Failed to parse Ollama response: {}", e)))?;

    if response.embeddings.len() != expected {
        return Err(AppError::Embedding(format!(
            "Ollama returned {} embeddings for {} inputs",
            response.embeddings.len(),
            expected
        )));
    }

    Ok(response.embeddings)
}

/// Extract a readable message from an Ollama error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        None
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "ollama", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = self.embed_url();
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to read Ollama response: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Embedding(format!(
                "Ollama API error ({}): {}",
                status,
                error_message(&body)
            )));
        }

        parse_embed_response(&body, texts.len())
    }
}
