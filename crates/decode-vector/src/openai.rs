//! Remote embeddings through an OpenAI-compatible `/embeddings` endpoint.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use decode_core::config::EmbeddingConfig;
use decode_core::error::ServiceError;

use crate::embedding::EmbeddingService;

const MAX_INPUTS_PER_REQUEST: usize = 2048;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'static str,
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

/// Embedding client for OpenAI and API-compatible servers.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedding {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedding {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        }
    }

    /// Build from the `[embedding]` config section, reading the API key from
    /// the configured environment variable.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, ServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                ServiceError::Config(format!(
                    "environment variable {} is not set",
                    config.api_key_env
                ))
            })?;
        Ok(Self::new(
            &config.base_url,
            api_key,
            &config.model,
            config.dimensions,
        ))
    }

    fn request<'a>(&'a self, texts: &'a [String]) -> EmbeddingRequest<'a> {
        // Only the text-embedding-3 family accepts a dimensions override.
        let dimensions = self
            .model
            .starts_with("text-embedding-3")
            .then_some(self.dimensions);
        EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions,
            encoding_format: "float",
        }
    }

    /// Vectors of a response body, restored to input order.
    fn parse_response(&self, body: &str, expected: usize) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut response: EmbeddingResponse = serde_json::from_str(body)
            .map_err(|e| ServiceError::InvalidResponse(format!("embedding response: {}", e)))?;

        if response.data.len() != expected {
            return Err(ServiceError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                expected,
                response.data.len()
            )));
        }

        response.data.sort_by_key(|d| d.index);
        let mut vectors = Vec::with_capacity(expected);
        for (position, data) in response.data.into_iter().enumerate() {
            if data.index != position {
                return Err(ServiceError::InvalidResponse(format!(
                    "embedding index {} missing from response",
                    position
                )));
            }
            if data.embedding.len() != self.dimensions {
                return Err(ServiceError::InvalidResponse(format!(
                    "embedding has {} dimensions, expected {}",
                    data.embedding.len(),
                    self.dimensions
                )));
            }
            vectors.push(data.embedding);
        }
        Ok(vectors)
    }

    async fn post(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let response = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request(texts))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Embedding request failed");
                ServiceError::Network(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(inputs = texts.len(), model = %self.model, "Embedding request completed");
        self.parse_response(&body, texts.len())
    }
}

impl EmbeddingService for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut vectors = self.post(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ServiceError::InvalidResponse("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.post(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        MAX_INPUTS_PER_REQUEST
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
