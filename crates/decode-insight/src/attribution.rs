//! Traces each insight point back to the transcript chunks that support it.

use tracing::{debug, info};

use decode_core::config::AttributionConfig;
use decode_core::error::{DecodeError, Result};
use decode_core::policy::CallPolicy;
use decode_core::types::{InsightPoint, SupportingQuote, SupportingQuotes};
use decode_vector::embedding::EmbeddingService;
use decode_vector::index::CorpusIndex;
use decode_vector::pipeline::{embed_texts, IngestOptions};

/// Selects supporting quotes by similarity between insight text and chunks.
#[derive(Debug, Clone)]
pub struct QuoteAttributor {
    top_n: usize,
    min_similarity: f64,
    options: IngestOptions,
}

impl QuoteAttributor {
    pub fn new(top_n: usize, min_similarity: f64, options: IngestOptions) -> Self {
        Self {
            top_n,
            min_similarity,
            options,
        }
    }

    pub fn from_config(config: &AttributionConfig, options: IngestOptions) -> Self {
        Self::new(config.top_n, config.min_similarity, options)
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.options.policy = policy;
        self
    }

    /// Supporting quotes for every point, in point order.
    ///
    /// Points are embedded with `embedder`, which must be the service that
    /// built `index`. A failed embedding call is an attribution error; a point
    /// without any chunk above the threshold gets empty quotes.
    pub async fn attribute<E: EmbeddingService>(
        &self,
        index: &CorpusIndex,
        embedder: &E,
        points: &[InsightPoint],
    ) -> Result<Vec<SupportingQuotes>> {
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = points.iter().map(|p| p.text.clone()).collect();
        let (vectors, _) = embed_texts(&texts, embedder, &self.options)
            .await
            .map_err(DecodeError::Attribution)?;

        let mut attributed = Vec::with_capacity(points.len());
        for (point, vector) in points.iter().zip(&vectors) {
            index
                .check_dimensions(vector)
                .map_err(DecodeError::Attribution)?;
            let quotes = self.select_quotes(index, vector);
            if quotes.is_gap() {
                info!(
                    insight = point.ordinal,
                    min_similarity = self.min_similarity,
                    "No supporting quote found for insight"
                );
            } else {
                debug!(
                    insight = point.ordinal,
                    quotes = quotes.len(),
                    best = quotes.as_slice()[0].score,
                    "Attributed insight"
                );
            }
            attributed.push(quotes);
        }
        Ok(attributed)
    }

    /// Up to `top_n` chunks scoring at least `min_similarity` against
    /// `vector`, most similar first.
    pub fn select_quotes(&self, index: &CorpusIndex, vector: &[f32]) -> SupportingQuotes {
        let quotes = index
            .search(vector, self.top_n)
            .into_iter()
            .filter(|hit| hit.score >= self.min_similarity)
            .map(|hit| SupportingQuote {
                chunk_id: hit.chunk.id,
                transcript: hit.chunk.transcript,
                position: hit.chunk.position,
                text: hit.chunk.text.trim().to_string(),
                score: hit.score,
            })
            .collect();
        SupportingQuotes::new(quotes)
    }
}
