//! Retrieval of the chunks most relevant to a research question.
//!
//! The question is embedded with the same service that embedded the corpus,
//! then matched against the [`CorpusIndex`].

use std::time::Instant;

use tracing::{debug, info};

use decode_core::error::{DecodeError, Result};
use decode_core::policy::{call_with_retry, CallPolicy};

use crate::embedding::EmbeddingService;
use crate::index::{CorpusIndex, SearchHit};

pub struct Retriever<'a, E: EmbeddingService> {
    index: &'a CorpusIndex,
    embedder: &'a E,
    top_k: usize,
    policy: CallPolicy,
}

impl<'a, E: EmbeddingService> Retriever<'a, E> {
    pub fn new(index: &'a CorpusIndex, embedder: &'a E, top_k: usize, policy: CallPolicy) -> Self {
        Self {
            index,
            embedder,
            top_k,
            policy,
        }
    }

    /// Top-k chunks for `question`, most similar first.
    ///
    /// Failing to embed the question is a retrieval error.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchHit<'a>>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DecodeError::Question(
                "research question is empty".to_string(),
            ));
        }

        let started = Instant::now();
        let query = call_with_retry(&self.policy, self.embedder.name(), || {
            self.embedder.embed(question)
        })
        .await
        .map_err(DecodeError::Retrieval)?;
        self.index
            .check_dimensions(&query)
            .map_err(DecodeError::Retrieval)?;

        let hits = self.index.search(&query, self.top_k);
        for hit in &hits {
            debug!(
                chunk = hit.chunk.ordinal,
                transcript = hit.chunk.transcript,
                score = hit.score,
                "Retrieved chunk"
            );
        }
        info!(
            hits = hits.len(),
            top_k = self.top_k,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Retrieved context for question"
        );
        Ok(hits)
    }
}
