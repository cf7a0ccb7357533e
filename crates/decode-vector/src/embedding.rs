//! Embedding service trait and the local hashing implementation.
//!
//! - [`EmbeddingService`] is the seam every provider implements. The same
//!   service must embed the corpus, the research question and the insight
//!   points, otherwise similarities are meaningless.
//! - [`DynEmbeddingService`] is its object-safe twin so the binary can pick a
//!   provider at runtime.
//! - [`HashingEmbedding`] is a deterministic bag-of-words model: no network,
//!   no model files, and texts sharing content words score as similar.
//!
//! Remote and ONNX providers live in [`crate::openai`] and [`crate::onnx`].

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;

use decode_core::error::ServiceError;

/// Boxed future returned by the object-safe service traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Service for generating text embeddings.
pub trait EmbeddingService: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, ServiceError>> + Send;

    /// Embed several texts in one call. The result has one vector per input,
    /// in input order.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, ServiceError>> + Send;

    /// Dimensionality of the vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Largest number of texts accepted by one `embed_batch` call.
    fn max_batch_size(&self) -> usize {
        256
    }

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every `EmbeddingService`
/// automatically implements `DynEmbeddingService`, and
/// `Box<dyn DynEmbeddingService>` is itself an `EmbeddingService`.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, ServiceError>>;

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, ServiceError>>;

    fn dimensions(&self) -> usize;

    fn max_batch_size(&self) -> usize;

    fn name(&self) -> &'static str;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, ServiceError>> {
        Box::pin(self.embed(text))
    }

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, ServiceError>> {
        Box::pin(self.embed_batch(texts))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }

    fn max_batch_size(&self) -> usize {
        EmbeddingService::max_batch_size(self)
    }

    fn name(&self) -> &'static str {
        EmbeddingService::name(self)
    }
}

impl EmbeddingService for Box<dyn DynEmbeddingService> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.as_ref().embed_boxed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        self.as_ref().embed_batch_boxed(texts).await
    }

    fn dimensions(&self) -> usize {
        DynEmbeddingService::dimensions(self.as_ref())
    }

    fn max_batch_size(&self) -> usize {
        DynEmbeddingService::max_batch_size(self.as_ref())
    }

    fn name(&self) -> &'static str {
        DynEmbeddingService::name(self.as_ref())
    }
}

/// L2-normalize in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vector.iter_mut() {
            *val /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// HashingEmbedding - deterministic bag-of-words vectors
// ---------------------------------------------------------------------------

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had",
    "has", "have", "he", "her", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "just", "me", "more", "my", "no", "not", "of", "on", "or", "our", "out", "she", "so", "some",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "to", "too", "up", "us", "very", "was", "we", "were", "what", "when", "which", "who", "will",
    "with", "would", "you", "your",
];

/// Feature-hashing embedding over lowercase content words.
///
/// Each content word (stopwords removed, trailing plural `s` stripped) adds
/// one to the bucket its hash selects. The vector is L2-normalized, so the
/// cosine of two texts grows with the words they share. A text with no
/// content words maps to the zero vector, which is similar to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl HashingEmbedding {
    pub const DEFAULT_DIMENSIONS: usize = 1024;

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// The normalized vector for `text`.
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in content_words(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }

    fn check(text: &str) -> Result<(), ServiceError> {
        if text.is_empty() {
            return Err(ServiceError::InvalidResponse(
                "Cannot embed empty text".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        Self::check(text)?;
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        texts
            .iter()
            .map(|text| {
                Self::check(text)?;
                Ok(self.vectorize(text))
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        1024
    }

    fn name(&self) -> &'static str {
        "hashing"
    }
}

/// Lowercase alphanumeric words of `text` minus stopwords and one-letter words.
fn content_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .map(|word| {
            if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
                word[..word.len() - 1].to_string()
            } else {
                word
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_hashing_dimension() {
        let service = HashingEmbedding::new(256);
        let vec = service.embed("hello world").await.unwrap();
        assert_eq!(vec.len(), 256);
        assert_eq!(EmbeddingService::dimensions(&service), 256);
    }

    #[tokio::test]
    async fn test_hashing_deterministic() {
        let service = HashingEmbedding::default();
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_hashing_empty_text() {
        let service = HashingEmbedding::default();
        assert!(service.embed("").await.is_err());
    }

    #[tokio::test]
    async fn test_hashing_unit_norm() {
        let service = HashingEmbedding::default();
        let vec = service.embed("the onboarding flow was great").await.unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_stopword_only_text_is_zero_vector() {
        let service = HashingEmbedding::default();
        let vec = service.embed("it was the").await.unwrap();
        assert!(vec.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_shared_words_score_higher() {
        let service = HashingEmbedding::new(4096);
        let question = service.vectorize("Users loved the onboarding flow");
        let related = service.vectorize("I loved the onboarding flow.");
        let unrelated = service.vectorize("Pricing was confusing and too high.");
        assert!(cosine(&question, &related) > 0.5);
        assert!(cosine(&question, &related) > cosine(&question, &unrelated));
    }

    #[test]
    fn test_plural_and_case_folding() {
        let service = HashingEmbedding::new(4096);
        assert_eq!(service.vectorize("Users"), service.vectorize("user"));
        assert_eq!(service.vectorize("PRICES"), service.vectorize("price"));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let service = HashingEmbedding::default();
        let texts = vec!["first text".to_string(), "second text".to_string()];
        let batch = service.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], service.embed("first text").await.unwrap());
        assert_eq!(batch[1], service.embed("second text").await.unwrap());
    }

    #[tokio::test]
    async fn test_boxed_dispatch() {
        let service: Box<dyn DynEmbeddingService> = Box::new(HashingEmbedding::new(64));
        let vec = service.embed("boxed call").await.unwrap();
        assert_eq!(vec.len(), 64);
        assert_eq!(EmbeddingService::name(&service), "hashing");
        assert_eq!(EmbeddingService::max_batch_size(&service), 1024);

        let texts = vec!["first text".to_string(), "second text".to_string()];
        let batch = service.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], HashingEmbedding::new(64).vectorize("first text"));
    }
}
