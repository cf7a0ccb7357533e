//! Splits transcripts into bounded, overlapping chunks.
//!
//! Chunk boundaries prefer natural breaks in the text. Within the back half
//! of the size window the chunker looks for, in order, a paragraph break, a
//! line break, a sentence end, and any whitespace. If none exists it falls
//! back to any whitespace after the overlap and finally cuts at exactly
//! `max_chars`. Consecutive chunks of one transcript share exactly
//! `overlap_chars` characters, so concatenating each chunk's
//! [`Chunk::fresh_text`] reproduces the transcript.

use uuid::Uuid;

use decode_core::config::ChunkingConfig;
use decode_core::error::{DecodeError, Result};
use decode_core::types::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

impl Boundary {
    const PREFERENCE: [Boundary; 4] = [
        Boundary::Paragraph,
        Boundary::Line,
        Boundary::Sentence,
        Boundary::Word,
    ];

    /// Whether a chunk ending at char index `end` ends on this boundary.
    fn ends_at(self, chars: &[char], end: usize) -> bool {
        match self {
            Boundary::Paragraph => end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n',
            Boundary::Line => end >= 1 && chars[end - 1] == '\n',
            Boundary::Sentence => {
                end >= 2
                    && chars[end - 1].is_whitespace()
                    && matches!(chars[end - 2], '.' | '!' | '?')
            }
            Boundary::Word => end >= 1 && chars[end - 1].is_whitespace(),
        }
    }
}

/// Character-window chunker with overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    /// Create a chunker. `overlap_chars` must be smaller than `max_chars`.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(DecodeError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(DecodeError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap_chars, max_chars
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.max_chars, config.overlap_chars)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Split one (possibly merged) text. All chunks belong to transcript 0.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        self.split_transcripts(&[text])
    }

    /// Split every transcript independently, numbering chunks in corpus order.
    ///
    /// Empty and whitespace-only transcripts yield no chunks.
    pub fn split_transcripts<S: AsRef<str>>(&self, transcripts: &[S]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (transcript, text) in transcripts.iter().enumerate() {
            let text = text.as_ref();
            let windows = self.windows(text);
            if windows.is_empty() {
                continue;
            }

            let offsets = char_offsets(text);
            for (position, (start, end, overlap)) in windows.into_iter().enumerate() {
                chunks.push(Chunk {
                    id: Uuid::new_v4(),
                    ordinal: chunks.len(),
                    transcript,
                    position,
                    text: text[offsets[start]..offsets[end]].to_string(),
                    start,
                    end,
                    overlap,
                });
            }
        }
        chunks
    }

    /// Concatenate the fresh text of consecutive chunks of one transcript.
    pub fn reassemble(chunks: &[Chunk]) -> String {
        chunks.iter().map(Chunk::fresh_text).collect()
    }

    /// `(start, end, overlap)` character windows covering `text`.
    fn windows(&self, text: &str) -> Vec<(usize, usize, usize)> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut windows = Vec::new();
        let mut start = 0;
        let mut overlap = 0;

        loop {
            if total - start <= self.max_chars {
                windows.push((start, total, overlap));
                return windows;
            }

            let end = self.break_point(&chars, start);
            windows.push((start, end, overlap));
            start = end - self.overlap_chars;
            overlap = self.overlap_chars;
        }
    }

    /// End of the chunk starting at `start`, which is followed by more text.
    ///
    /// The result always exceeds `start + overlap_chars`, so the next chunk
    /// starts strictly later than this one.
    fn break_point(&self, chars: &[char], start: usize) -> usize {
        let limit = start + self.max_chars;
        let min_end = start + self.overlap_chars + 1;
        let preferred_end = (start + self.max_chars / 2).max(min_end);

        for boundary in Boundary::PREFERENCE {
            if let Some(end) = last_boundary(chars, boundary, preferred_end, limit) {
                return end;
            }
        }
        last_boundary(chars, Boundary::Word, min_end, limit).unwrap_or(limit)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            max_chars: config.max_chars,
            overlap_chars: config.overlap_chars,
        }
    }
}

fn last_boundary(chars: &[char], boundary: Boundary, from: usize, to: usize) -> Option<usize> {
    (from..=to).rev().find(|&end| boundary.ends_at(chars, end))
}

/// Byte offset of every char index, plus the total length.
fn char_offsets(text: &str) -> Vec<usize> {
    let mut offsets: Vec<usize> = text.char_indices().map(|(byte, _)| byte).collect();
    offsets.push(text.len());
    offsets
}
