//! Provider selection from configuration.

use decode_core::config::{EmbeddingConfig, GenerationConfig};
use decode_core::error::{DecodeError, Result};
use decode_insight::llm::{DynGenerationService, OpenAiChat};
use decode_vector::embedding::{DynEmbeddingService, HashingEmbedding};
use decode_vector::onnx::OnnxEmbedding;
use decode_vector::openai::OpenAiEmbedding;

use crate::cli::expand_home;

/// Create the embedding service named by `config.provider`.
pub fn create_embedding_service(config: &EmbeddingConfig) -> Result<Box<dyn DynEmbeddingService>> {
    let service: Box<dyn DynEmbeddingService> = match config.provider.as_str() {
        "openai" => Box::new(OpenAiEmbedding::from_config(config).map_err(provider_error)?),
        "onnx" => Box::new(
            OnnxEmbedding::from_directory(&expand_home(&config.model_dir))
                .map_err(provider_error)?,
        ),
        "hashing" => Box::new(HashingEmbedding::new(config.dimensions)),
        other => {
            return Err(DecodeError::Config(format!(
                "unknown embedding provider '{}' (expected openai, onnx or hashing)",
                other
            )))
        }
    };
    tracing::info!(
        provider = service.name(),
        dimensions = service.dimensions(),
        "Embedding service ready"
    );
    Ok(service)
}

/// Create the generation service named by `config.provider`.
pub fn create_generation_service(config: &GenerationConfig) -> Result<Box<dyn DynGenerationService>> {
    match config.provider.as_str() {
        "openai" => {
            let chat = OpenAiChat::from_config(config).map_err(provider_error)?;
            tracing::info!(model = %config.model, "Generation service ready");
            Ok(Box::new(chat))
        }
        other => Err(DecodeError::Config(format!(
            "unknown generation provider '{}' (expected openai)",
            other
        ))),
    }
}

fn provider_error(err: decode_core::error::ServiceError) -> DecodeError {
    DecodeError::Config(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_provider() {
        let config = EmbeddingConfig {
            provider: "hashing".to_string(),
            dimensions: 256,
            ..EmbeddingConfig::default()
        };
        let service = create_embedding_service(&config).unwrap();
        assert_eq!(service.dimensions(), 256);
        assert_eq!(service.name(), "hashing");
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedding_service(&config),
            Err(DecodeError::Config(_))
        ));

        let config = GenerationConfig {
            provider: "carrier-pigeon".to_string(),
            ..GenerationConfig::default()
        };
        assert!(matches!(
            create_generation_service(&config),
            Err(DecodeError::Config(_))
        ));
    }

    #[test]
    fn test_missing_onnx_model_is_config_error() {
        let config = EmbeddingConfig {
            provider: "onnx".to_string(),
            model_dir: "/nonexistent/model".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedding_service(&config),
            Err(DecodeError::Config(_))
        ));
    }
}
