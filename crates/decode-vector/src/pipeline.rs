//! Corpus ingestion pipeline.
//!
//! Processes transcripts through:
//! 1. Validation (an empty corpus fails before any embedding call)
//! 2. Chunking
//! 3. Batched embedding, a bounded number of batches in flight
//! 4. Corpus index construction
//!
//! Any embedding failure fails the whole ingestion; no partial index is
//! ever returned.

use std::time::Instant;

use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use decode_core::config::EmbeddingConfig;
use decode_core::error::{DecodeError, Result, ServiceError};
use decode_core::policy::{call_with_retry, CallPolicy};
use decode_core::types::Chunk;

use crate::chunker::Chunker;
use crate::embedding::EmbeddingService;
use crate::index::CorpusIndex;

/// Batching and call policy for embedding a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    pub policy: CallPolicy,
}

impl IngestOptions {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_concurrent_batches: config.max_concurrent_batches,
            policy: config.call_policy(),
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default())
    }
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub transcripts: usize,
    pub chunks: usize,
    pub batches: usize,
    pub dimensions: usize,
    pub elapsed_ms: u64,
}

/// Chunk, embed and index a set of transcripts.
pub async fn ingest_corpus<S, E>(
    transcripts: &[S],
    chunker: &Chunker,
    embedder: &E,
    options: &IngestOptions,
) -> Result<(CorpusIndex, IngestReport)>
where
    S: AsRef<str>,
    E: EmbeddingService,
{
    if transcripts.is_empty() {
        return Err(DecodeError::Ingestion("no transcripts supplied".to_string()));
    }
    if transcripts.iter().all(|t| t.as_ref().trim().is_empty()) {
        return Err(DecodeError::Ingestion(
            "transcripts contain no text".to_string(),
        ));
    }

    let started = Instant::now();
    let chunks = chunker.split_transcripts(transcripts);
    debug!(
        transcripts = transcripts.len(),
        chunks = chunks.len(),
        "Chunked transcripts"
    );

    let (index, batches) = build_index(chunks, embedder, options).await?;
    let report = IngestReport {
        transcripts: transcripts.len(),
        chunks: index.len(),
        batches,
        dimensions: index.dimensions(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        transcripts = report.transcripts,
        chunks = report.chunks,
        batches = report.batches,
        dimensions = report.dimensions,
        elapsed_ms = report.elapsed_ms,
        embedder = embedder.name(),
        "Corpus indexed"
    );
    Ok((index, report))
}

/// Embed `chunks` and build the index. Returns the index and the number of
/// embedding batches sent.
pub async fn build_index<E: EmbeddingService>(
    chunks: Vec<Chunk>,
    embedder: &E,
    options: &IngestOptions,
) -> Result<(CorpusIndex, usize)> {
    if chunks.is_empty() {
        return Err(DecodeError::Ingestion(
            "corpus contains no text to index".to_string(),
        ));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let (embeddings, batches) = embed_texts(&texts, embedder, options)
        .await
        .map_err(DecodeError::Indexing)?;

    for embedding in &embeddings {
        if embedding.len() != embedder.dimensions() {
            return Err(DecodeError::Indexing(ServiceError::InvalidResponse(format!(
                "{} returned {} dimensions, expected {}",
                embedder.name(),
                embedding.len(),
                embedder.dimensions()
            ))));
        }
    }

    let index = CorpusIndex::from_embeddings(chunks, embeddings)?;
    Ok((index, batches))
}

/// Embed `texts` in batches, keeping input order. Returns the vectors and
/// the number of batches.
pub async fn embed_texts<E: EmbeddingService>(
    texts: &[String],
    embedder: &E,
    options: &IngestOptions,
) -> std::result::Result<(Vec<Vec<f32>>, usize), ServiceError> {
    let batch_size = options.batch_size.min(embedder.max_batch_size()).max(1);
    let batches: Vec<&[String]> = texts.chunks(batch_size).collect();
    let batch_count = batches.len();

    let results: Vec<Vec<Vec<f32>>> = stream::iter(batches.into_iter().enumerate())
        .map(|(number, batch)| async move {
            let vectors = call_with_retry(&options.policy, embedder.name(), || {
                embedder.embed_batch(batch)
            })
            .await?;
            if vectors.len() != batch.len() {
                return Err(ServiceError::InvalidResponse(format!(
                    "batch of {} texts produced {} embeddings",
                    batch.len(),
                    vectors.len()
                )));
            }
            debug!(batch = number, size = batch.len(), "Embedded batch");
            Ok(vectors)
        })
        .buffered(options.max_concurrent_batches.max(1))
        .try_collect()
        .await?;

    Ok((results.into_iter().flatten().collect(), batch_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedding;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Hashing embedder that counts calls and can fail on a given batch.
    struct Counting {
        inner: HashingEmbedding,
        batches: AtomicUsize,
        fail_on: Option<usize>,
        max_batch: usize,
    }

    impl Counting {
        fn new(fail_on: Option<usize>, max_batch: usize) -> Self {
            Self {
                inner: HashingEmbedding::new(128),
                batches: AtomicUsize::new(0),
                fail_on,
                max_batch,
            }
        }
    }

    impl EmbeddingService for Counting {
        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ServiceError> {
            self.inner.embed(text).await
        }

        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, ServiceError> {
            let n = self.batches.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(n) {
                return Err(ServiceError::Status {
                    status: 400,
                    body: "rejected".into(),
                });
            }
            self.inner.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            128
        }

        fn max_batch_size(&self) -> usize {
            self.max_batch
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn options(batch_size: usize) -> IngestOptions {
        IngestOptions {
            batch_size,
            max_concurrent_batches: 3,
            policy: CallPolicy::once(Duration::from_secs(5)),
        }
    }

    fn transcripts() -> Vec<String> {
        (0..6)
            .map(|i| format!("Interview {} talked about onboarding and pricing at length.", i))
            .collect()
    }

    #[tokio::test]
    async fn test_ingest_builds_index() {
        let embedder = Counting::new(None, 100);
        let chunker = Chunker::new(1000, 100).unwrap();
        let (index, report) = ingest_corpus(&transcripts(), &chunker, &embedder, &options(4))
            .await
            .unwrap();
        assert_eq!(index.len(), 6);
        assert_eq!(report.chunks, 6);
        assert_eq!(report.batches, 2);
        assert_eq!(report.dimensions, 128);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batch_size_capped_by_provider() {
        let embedder = Counting::new(None, 2);
        let chunker = Chunker::default();
        let (_, report) = ingest_corpus(&transcripts(), &chunker, &embedder, &options(64))
            .await
            .unwrap();
        assert_eq!(report.batches, 3);
    }

    #[tokio::test]
    async fn test_embeddings_keep_chunk_order() {
        let embedder = Counting::new(None, 1);
        let chunker = Chunker::default();
        let (index, _) = ingest_corpus(&transcripts(), &chunker, &embedder, &options(1))
            .await
            .unwrap();
        for chunk in index.chunks() {
            let expected = embedder.inner.vectorize(&chunk.text);
            assert_eq!(index.embedding(chunk.ordinal).unwrap(), expected.as_slice());
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_ingestion_error_without_embedding() {
        let embedder = Counting::new(None, 100);
        let chunker = Chunker::default();

        let none: Vec<String> = Vec::new();
        let err = ingest_corpus(&none, &chunker, &embedder, &options(4))
            .await
            .unwrap_err();
        assert!(matches!(err, DecodeError::Ingestion(_)));

        let err = ingest_corpus(&["", "  \n"], &chunker, &embedder, &options(4))
            .await
            .unwrap_err();
        assert!(matches!(err, DecodeError::Ingestion(_)));
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_batch_fails_whole_ingestion() {
        let embedder = Counting::new(Some(1), 100);
        let chunker = Chunker::default();
        let err = ingest_corpus(&transcripts(), &chunker, &embedder, &options(2))
            .await
            .unwrap_err();
        assert!(matches!(err, DecodeError::Indexing(_)));
    }
}
