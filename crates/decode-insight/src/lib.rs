//! Decode Insight crate - grounded narrative generation and quote attribution.
//!
//! Turns a research question into traceable findings:
//! - Prompt construction from retrieved transcript context
//! - Narrative generation through a pluggable generation service
//! - Segmentation of the narrative into insight points with summaries
//! - Attribution of supporting quotes to each point
//! - A research session that owns the corpus index between questions

pub mod attribution;
pub mod generator;
pub mod llm;
pub mod segmenter;
pub mod session;

pub use attribution::QuoteAttributor;
pub use generator::InsightGenerator;
pub use llm::{DynGenerationService, GenerationService, OpenAiChat};
pub use segmenter::{InsightSegmenter, MARKER_GRAMMAR_VERSION};
pub use session::{IndexStatus, ResearchSession};
