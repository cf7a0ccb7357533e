use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shown in place of quotes when an insight has no supporting source text.
pub const NO_SUPPORTING_QUOTE: &str = "no supporting quote found";

// =============================================================================
// Corpus
// =============================================================================

/// A bounded, contiguous span of one transcript.
///
/// Offsets are in characters relative to the originating transcript. The first
/// `overlap` characters repeat the tail of the previous chunk of the same
/// transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    /// Position in the whole corpus; the tie-break for equal similarity.
    pub ordinal: usize,
    /// Index of the originating transcript.
    pub transcript: usize,
    /// Sequence position within the originating transcript.
    pub position: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub overlap: usize,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }

    /// The chunk text without the prefix shared with the previous chunk.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

/// Identity of a transcript set. Two sets with equal keys share a corpus index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorpusKey {
    pub transcripts: usize,
    pub bytes: usize,
    pub digest: u64,
}

impl CorpusKey {
    pub fn of<S: AsRef<str>>(transcripts: &[S]) -> Self {
        let mut hasher = DefaultHasher::new();
        let mut bytes = 0;
        for transcript in transcripts {
            let text = transcript.as_ref();
            bytes += text.len();
            text.hash(&mut hasher);
        }
        Self {
            transcripts: transcripts.len(),
            bytes,
            digest: hasher.finish(),
        }
    }
}

// =============================================================================
// Insights
// =============================================================================

/// One self-contained claim segmented out of a generated narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightPoint {
    /// 1-based position within the narrative.
    pub ordinal: usize,
    /// Byte range of the narrative this point covers.
    pub span: Range<usize>,
    /// The point's text with surrounding whitespace trimmed.
    pub text: String,
    pub summary: String,
}

/// A source passage supporting one insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingQuote {
    pub chunk_id: Uuid,
    pub transcript: usize,
    pub position: usize,
    pub text: String,
    /// Cosine similarity between the insight and the chunk.
    pub score: f64,
}

/// Ranked supporting quotes of one insight, highest similarity first.
///
/// Empty means an attribution gap: no chunk cleared the similarity threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportingQuotes(Vec<SupportingQuote>);

impl SupportingQuotes {
    pub fn new(quotes: Vec<SupportingQuote>) -> Self {
        Self(quotes)
    }

    pub fn is_gap(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SupportingQuote> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[SupportingQuote] {
        &self.0
    }

    /// Quote texts for rendering; a gap renders as [`NO_SUPPORTING_QUOTE`].
    pub fn display_lines(&self) -> Vec<&str> {
        if self.is_gap() {
            vec![NO_SUPPORTING_QUOTE]
        } else {
            self.0.iter().map(|q| q.text.as_str()).collect()
        }
    }
}

impl<'a> IntoIterator for &'a SupportingQuotes {
    type Item = &'a SupportingQuote;
    type IntoIter = std::slice::Iter<'a, SupportingQuote>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An insight point together with its supporting quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub ordinal: usize,
    pub summary: String,
    pub text: String,
    pub quotes: SupportingQuotes,
}

/// A chunk retrieved as generation context for the research question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPassage {
    pub chunk_id: Uuid,
    pub transcript: usize,
    pub position: usize,
    pub score: f64,
}

/// Everything one research question produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Findings {
    pub question: String,
    pub narrative: String,
    pub insights: Vec<Insight>,
    pub context: Vec<ContextPassage>,
    pub generated_at: DateTime<Utc>,
}

impl Findings {
    /// `(summary, full insight text, supporting quotes)` per insight, in order.
    pub fn triples(&self) -> Vec<(&str, &str, &SupportingQuotes)> {
        self.insights
            .iter()
            .map(|i| (i.summary.as_str(), i.text.as_str(), &i.quotes))
            .collect()
    }

    /// Number of insights without any supporting quote.
    pub fn attribution_gaps(&self) -> usize {
        self.insights.iter().filter(|i| i.quotes.is_gap()).count()
    }
}
