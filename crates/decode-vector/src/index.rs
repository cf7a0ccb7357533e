//! In-memory corpus index with brute-force cosine similarity search.
//!
//! Search is O(n) per query, which is acceptable for interview corpora of a
//! few thousand chunks. Ties in similarity are broken by corpus order so the
//! same query always yields the same ranking.

use decode_core::error::{DecodeError, Result, ServiceError};
use decode_core::types::Chunk;

/// A chunk matched by a similarity search.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub chunk: &'a Chunk,
    /// Cosine similarity in [-1.0, 1.0].
    pub score: f64,
}

/// Immutable index over every chunk of a corpus and its embedding.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    dimensions: usize,
}

impl CorpusIndex {
    /// Pair chunks with their embeddings.
    ///
    /// Chunk ordinals are reset to their position so they match corpus order.
    /// An empty chunk set is an ingestion error; mismatched counts or widths
    /// are indexing errors.
    pub fn from_embeddings(mut chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(DecodeError::Ingestion(
                "corpus contains no text to index".to_string(),
            ));
        }
        if chunks.len() != embeddings.len() {
            return Err(DecodeError::Indexing(ServiceError::InvalidResponse(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            ))));
        }

        let dimensions = embeddings[0].len();
        if dimensions == 0 {
            return Err(DecodeError::Indexing(ServiceError::InvalidResponse(
                "embeddings are empty".to_string(),
            )));
        }
        if let Some(bad) = embeddings.iter().position(|e| e.len() != dimensions) {
            return Err(DecodeError::Indexing(ServiceError::InvalidResponse(format!(
                "embedding {} has {} dimensions, expected {}",
                bad,
                embeddings[bad].len(),
                dimensions
            ))));
        }

        for (ordinal, chunk) in chunks.iter_mut().enumerate() {
            chunk.ordinal = ordinal;
        }

        Ok(Self {
            chunks,
            embeddings,
            dimensions,
        })
    }

    /// The `k` chunks most similar to `query`, most similar first.
    ///
    /// Returns every chunk when `k` exceeds the corpus size. A query of the
    /// wrong width scores 0.0 against everything; callers check the width
    /// with [`CorpusIndex::check_dimensions`] first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit<'_>> {
        let mut scored: Vec<SearchHit<'_>> = self
            .chunks
            .iter()
            .zip(&self.embeddings)
            .map(|(chunk, embedding)| SearchHit {
                chunk,
                score: cosine_similarity(query, embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.chunk.ordinal.cmp(&b.chunk.ordinal))
        });
        scored.truncate(k);
        scored
    }

    pub fn check_dimensions(&self, vector: &[f32]) -> std::result::Result<(), ServiceError> {
        if vector.len() != self.dimensions {
            return Err(ServiceError::InvalidResponse(format!(
                "embedding has {} dimensions but the corpus index uses {}",
                vector.len(),
                self.dimensions
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn embedding(&self, ordinal: usize) -> Option<&[f32]> {
        self.embeddings.get(ordinal).map(Vec::as_slice)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if the lengths differ or either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}
