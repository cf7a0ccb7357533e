//! Text generation service trait and the OpenAI-compatible chat client.

use std::future::Future;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use decode_core::config::GenerationConfig;
use decode_core::error::ServiceError;
use decode_vector::embedding::BoxFuture;

const SYSTEM_PROMPT: &str = "You are a qualitative research analyst. \
    You answer strictly from the interview excerpts you are given and follow the output format exactly.";

/// Service that turns a prompt into generated text.
pub trait GenerationService: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, ServiceError>> + Send;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}

/// Object-safe version of [`GenerationService`] for dynamic dispatch.
pub trait DynGenerationService: Send + Sync {
    fn generate_boxed<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ServiceError>>;

    fn name(&self) -> &'static str;
}

impl<T: GenerationService> DynGenerationService for T {
    fn generate_boxed<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ServiceError>> {
        Box::pin(self.generate(prompt))
    }

    fn name(&self) -> &'static str {
        GenerationService::name(self)
    }
}

impl GenerationService for Box<dyn DynGenerationService> {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        self.as_ref().generate_boxed(prompt).await
    }

    fn name(&self) -> &'static str {
        DynGenerationService::name(self.as_ref())
    }
}

/// Chat-completions client for OpenAI and API-compatible servers.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        }
    }

    /// Build from the `[generation]` config section, reading the API key from
    /// the configured environment variable.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, ServiceError> {
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
            config.temperature,
        ))
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.temperature,
        })
    }

    fn parse_response(body: &str) -> Result<String, ServiceError> {
        let response: ChatResponse = serde_json::from_str(body)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InvalidResponse("no choices".into()))?;
        choice
            .message
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidResponse("empty completion".into()))
    }
}

impl GenerationService for OpenAiChat {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.build_request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Chat completion request failed");
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

        debug!(model = %self.model, bytes = body.len(), "Chat completion received");
        Self::parse_response(body.trim())
    }

    fn name(&self) -> &'static str {
        "openai-chat"
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
