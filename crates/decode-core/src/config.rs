use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DecodeError, Result};
use crate::policy::CallPolicy;

/// Smallest accepted prompt budget: the fixed instructions plus room for a
/// question and at least part of one excerpt.
pub const MIN_PROMPT_CHARS: usize = 2000;

/// Top-level configuration for a Decode research session.
///
/// Loaded from `~/.decode/config.toml` by default. Each section corresponds
/// to one pipeline stage or external service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub attribution: AttributionConfig,
}

impl DecodeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DecodeConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(DecodeError::Config(
                "chunking.max_chars must be greater than 0".into(),
            ));
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            return Err(DecodeError::Config(format!(
                "chunking.overlap_chars ({}) must be smaller than chunking.max_chars ({})",
                self.chunking.overlap_chars, self.chunking.max_chars
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(DecodeError::Config(
                "embedding.batch_size must be greater than 0".into(),
            ));
        }
        if self.embedding.max_concurrent_batches == 0 {
            return Err(DecodeError::Config(
                "embedding.max_concurrent_batches must be greater than 0".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(DecodeError::Config(
                "retrieval.top_k must be greater than 0".into(),
            ));
        }
        if self.attribution.top_n == 0 {
            return Err(DecodeError::Config(
                "attribution.top_n must be greater than 0".into(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.attribution.min_similarity) {
            return Err(DecodeError::Config(format!(
                "attribution.min_similarity ({}) must lie in [-1, 1]",
                self.attribution.min_similarity
            )));
        }
        if self.attribution.max_summary_chars < 8 {
            return Err(DecodeError::Config(
                "attribution.max_summary_chars must be at least 8".into(),
            ));
        }
        if self.generation.max_prompt_chars < MIN_PROMPT_CHARS {
            return Err(DecodeError::Config(format!(
                "generation.max_prompt_chars ({}) must be at least {}",
                self.generation.max_prompt_chars, MIN_PROMPT_CHARS
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Transcript chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub max_chars: usize,
    /// Characters shared between consecutive chunks of one transcript.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap_chars: 100,
        }
    }
}

/// Embedding service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider: "openai", "onnx", or "hashing".
    pub provider: String,
    /// Model name sent to the provider.
    pub model: String,
    /// Vector dimensionality (used by "openai" and "hashing").
    pub dimensions: usize,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Directory with `model.onnx` and `tokenizer.json` for the "onnx" provider.
    pub model_dir: String,
    /// Texts per embedding request.
    pub batch_size: usize,
    /// Embedding requests in flight during corpus indexing.
    pub max_concurrent_batches: usize,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Retries on transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model_dir: "~/.decode/models/all-MiniLM-L6-v2".to_string(),
            batch_size: 64,
            max_concurrent_batches: 4,
            timeout_secs: 30,
            max_retries: 2,
            retry_base_ms: 200,
        }
    }
}

impl EmbeddingConfig {
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_base: Duration::from_millis(self.retry_base_ms),
        }
    }
}

/// Question-driven retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved as generation context.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 8 }
    }
}

/// Generative-text service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider: "openai" (any OpenAI-compatible chat completions API).
    pub provider: String,
    /// Model name sent to the provider.
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on the prompt length in characters.
    pub max_prompt_chars: usize,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Retries on transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.2,
            max_prompt_chars: 12_000,
            timeout_secs: 60,
            max_retries: 2,
            retry_base_ms: 200,
        }
    }
}

impl GenerationConfig {
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_base: Duration::from_millis(self.retry_base_ms),
        }
    }
}

/// Quote attribution and insight summary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Candidate chunks considered per insight.
    pub top_n: usize,
    /// Minimum cosine similarity for a chunk to count as a supporting quote.
    pub min_similarity: f64,
    /// Maximum length of a derived insight summary in characters.
    pub max_summary_chars: usize,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            min_similarity: 0.3,
            max_summary_chars: 80,
        }
    }
}
