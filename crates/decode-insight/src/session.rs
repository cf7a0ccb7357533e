//! A research session: one corpus, many research questions.
//!
//! The session owns the providers and the corpus index. Loading the same
//! transcript set again reuses the index; a different set rebuilds it. A
//! failed rebuild leaves the session without a corpus rather than with a
//! stale one.

use chrono::Utc;
use tracing::{info, warn};

use decode_core::config::DecodeConfig;
use decode_core::error::{DecodeError, Result};
use decode_core::types::{ContextPassage, CorpusKey, Findings, Insight};
use decode_vector::chunker::Chunker;
use decode_vector::embedding::EmbeddingService;
use decode_vector::index::CorpusIndex;
use decode_vector::pipeline::{ingest_corpus, IngestOptions, IngestReport};
use decode_vector::search::Retriever;

use crate::attribution::QuoteAttributor;
use crate::generator::InsightGenerator;
use crate::llm::GenerationService;
use crate::segmenter::InsightSegmenter;

/// Outcome of [`ResearchSession::load_transcripts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStatus {
    /// The corpus was chunked and embedded.
    Rebuilt(IngestReport),
    /// The transcripts match the loaded corpus; nothing was recomputed.
    Reused,
}

struct LoadedCorpus {
    key: CorpusKey,
    index: CorpusIndex,
}

/// Runs the ingestion and question pipeline with one embedder and one generator.
pub struct ResearchSession<E, G> {
    config: DecodeConfig,
    embedder: E,
    llm: G,
    chunker: Chunker,
    ingest: IngestOptions,
    generator: InsightGenerator,
    segmenter: InsightSegmenter,
    attributor: QuoteAttributor,
    corpus: Option<LoadedCorpus>,
}

impl<E: EmbeddingService, G: GenerationService> ResearchSession<E, G> {
    pub fn new(config: DecodeConfig, embedder: E, llm: G) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::from_config(&config.chunking)?;
        let ingest = IngestOptions::from_config(&config.embedding);
        let generator = InsightGenerator::from_config(&config.generation);
        let segmenter = InsightSegmenter::from_config(&config.attribution)?;
        let attributor = QuoteAttributor::from_config(&config.attribution, ingest);

        Ok(Self {
            config,
            embedder,
            llm,
            chunker,
            ingest,
            generator,
            segmenter,
            attributor,
            corpus: None,
        })
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn index(&self) -> Option<&CorpusIndex> {
        self.corpus.as_ref().map(|c| &c.index)
    }

    pub fn corpus_key(&self) -> Option<CorpusKey> {
        self.corpus.as_ref().map(|c| c.key)
    }

    /// Whether loading `transcripts` would rebuild the index.
    pub fn needs_rebuild<S: AsRef<str>>(&self, transcripts: &[S]) -> bool {
        self.corpus_key() != Some(CorpusKey::of(transcripts))
    }

    /// Make `transcripts` the session corpus, rebuilding the index only when
    /// the set differs from the loaded one.
    pub async fn load_transcripts<S: AsRef<str>>(&mut self, transcripts: &[S]) -> Result<IndexStatus> {
        let key = CorpusKey::of(transcripts);
        if self.corpus_key() == Some(key) {
            info!(transcripts = key.transcripts, "Transcript set unchanged, reusing corpus index");
            return Ok(IndexStatus::Reused);
        }

        self.corpus = None;
        let (index, report) =
            ingest_corpus(transcripts, &self.chunker, &self.embedder, &self.ingest).await?;
        self.corpus = Some(LoadedCorpus { key, index });
        Ok(IndexStatus::Rebuilt(report))
    }

    /// Answer one research question against the loaded corpus.
    ///
    /// Stages run in order: retrieve context, generate the narrative, segment
    /// it into points, attribute quotes. Any failure aborts the question and
    /// leaves the corpus untouched.
    pub async fn ask(&self, question: &str) -> Result<Findings> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DecodeError::Question(
                "research question is empty".to_string(),
            ));
        }
        let corpus = self
            .corpus
            .as_ref()
            .ok_or_else(|| DecodeError::Ingestion("no transcripts loaded".to_string()))?;

        let retriever = Retriever::new(
            &corpus.index,
            &self.embedder,
            self.config.retrieval.top_k,
            self.ingest.policy,
        );
        let context = retriever.retrieve(question).await?;

        let narrative = self
            .generator
            .generate(&self.llm, question, &context)
            .await
            .map_err(|err| {
                warn!(error = %err, "Generation failed, aborting question");
                err
            })?;

        let points = self.segmenter.segment(&narrative);
        let quotes = self
            .attributor
            .attribute(&corpus.index, &self.embedder, &points)
            .await?;

        let insights: Vec<Insight> = points
            .into_iter()
            .zip(quotes)
            .map(|(point, quotes)| Insight {
                ordinal: point.ordinal,
                summary: point.summary,
                text: point.text,
                quotes,
            })
            .collect();
        let findings = Findings {
            question: question.to_string(),
            narrative,
            insights,
            context: context
                .iter()
                .map(|hit| ContextPassage {
                    chunk_id: hit.chunk.id,
                    transcript: hit.chunk.transcript,
                    position: hit.chunk.position,
                    score: hit.score,
                })
                .collect(),
            generated_at: Utc::now(),
        };

        info!(
            insights = findings.insights.len(),
            gaps = findings.attribution_gaps(),
            context = findings.context.len(),
            "Research question answered"
        );
        Ok(findings)
    }
}
