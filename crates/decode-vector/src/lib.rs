//! Decode Vector crate - chunking, embedding services, corpus index and retrieval.
//!
//! Provides a character-window chunker with overlap, an embedding service
//! trait with remote (OpenAI-compatible), local (ONNX) and hashing
//! implementations, a brute-force cosine index over corpus chunks, question
//! retrieval, and the batched ingestion pipeline that ties them together.

pub mod chunker;
pub mod embedding;
pub mod index;
pub mod onnx;
pub mod openai;
pub mod pipeline;
pub mod search;

pub use chunker::Chunker;
pub use embedding::{BoxFuture, DynEmbeddingService, EmbeddingService, HashingEmbedding};
pub use index::{cosine_similarity, CorpusIndex, SearchHit};
pub use onnx::OnnxEmbedding;
pub use openai::OpenAiEmbedding;
pub use pipeline::{build_index, embed_texts, ingest_corpus, IngestOptions, IngestReport};
pub use search::Retriever;
