//! Prompt construction and narrative generation.

use std::time::Instant;

use tracing::{debug, info, warn};

use decode_core::config::{GenerationConfig, MIN_PROMPT_CHARS};
use decode_core::error::{DecodeError, Result};
use decode_core::policy::{call_with_retry, CallPolicy};
use decode_vector::index::SearchHit;

use crate::llm::GenerationService;

/// Builds the grounded prompt and asks the generation service for a narrative.
#[derive(Debug, Clone)]
pub struct InsightGenerator {
    max_prompt_chars: usize,
    policy: CallPolicy,
}

impl InsightGenerator {
    /// Budgets below [`MIN_PROMPT_CHARS`] are raised to it.
    pub fn new(max_prompt_chars: usize, policy: CallPolicy) -> Self {
        Self {
            max_prompt_chars: max_prompt_chars.max(MIN_PROMPT_CHARS),
            policy,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.max_prompt_chars, config.call_policy())
    }

    /// Prompt for `question` grounded in the retrieved `context`, at most
    /// `max_prompt_chars` long.
    ///
    /// The question may take at most half of what the instructions leave
    /// free, so excerpts always have room. Excerpts are added in ranking
    /// order while they fit; the first is truncated rather than dropped when
    /// it alone does not fit.
    pub fn build_prompt(&self, question: &str, context: &[SearchHit<'_>]) -> String {
        let frame = head(&QuestionText::default()).chars().count() + EXCERPTS_END.chars().count();
        let question_budget = self.max_prompt_chars.saturating_sub(frame) / 2;
        let question = QuestionText::bounded(question, question_budget);
        if question.truncated {
            warn!(
                limit = question_budget,
                "Research question truncated to fit the prompt budget"
            );
        }

        let mut prompt = head(&question);
        let mut used = prompt.chars().count() + EXCERPTS_END.chars().count();
        let mut included = 0;

        for (number, hit) in context.iter().enumerate() {
            let excerpt = format!(
                "[Excerpt {} | transcript {}, chunk {}]\n{}\n\n",
                number + 1,
                hit.chunk.transcript + 1,
                hit.chunk.position + 1,
                hit.chunk.text.trim()
            );
            let len = excerpt.chars().count();
            if used + len <= self.max_prompt_chars {
                prompt.push_str(&excerpt);
                used += len;
                included += 1;
            } else if included == 0 && used + 1 < self.max_prompt_chars {
                let room = self.max_prompt_chars - used;
                let truncated: String = excerpt.chars().take(room - 1).collect();
                prompt.push_str(&truncated);
                prompt.push('\n');
                included += 1;
                break;
            } else {
                break;
            }
        }
        prompt.push_str(EXCERPTS_END);

        if included == 0 && !context.is_empty() {
            warn!(
                available = context.len(),
                budget = self.max_prompt_chars,
                "No excerpt fits the prompt budget"
            );
        }
        debug!(
            excerpts = included,
            available = context.len(),
            chars = prompt.chars().count(),
            "Built generation prompt"
        );
        prompt
    }

    /// Generate the narrative for `question` in one call to `service`.
    pub async fn generate<G: GenerationService>(
        &self,
        service: &G,
        question: &str,
        context: &[SearchHit<'_>],
    ) -> Result<String> {
        let prompt = self.build_prompt(question, context);
        let started = Instant::now();

        let narrative = call_with_retry(&self.policy, service.name(), || service.generate(&prompt))
            .await
            .map_err(DecodeError::Generation)?;

        info!(
            provider = service.name(),
            chars = narrative.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated narrative"
        );
        Ok(narrative)
    }
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

const EXCERPTS_END: &str = "</excerpts>\n";

/// The research question as placed in the prompt.
#[derive(Debug, Default)]
struct QuestionText {
    text: String,
    truncated: bool,
}

impl QuestionText {
    /// `question` trimmed and cut to at most `limit` characters.
    fn bounded(question: &str, limit: usize) -> Self {
        let question = question.trim();
        if question.chars().count() <= limit {
            return Self {
                text: question.to_string(),
                truncated: false,
            };
        }
        let text: String = question.chars().take(limit).collect();
        Self {
            text: text.trim_end().to_string(),
            truncated: true,
        }
    }
}

/// Instructions, output format and question, up to the opening excerpts tag.
fn head(question: &QuestionText) -> String {
    format!(
        r#"<task>
Answer the research question below using only the interview excerpts that follow. Every claim must be grounded in what participants actually said; do not speculate or add outside knowledge. If the excerpts do not address the question, say so in one sentence instead.
</task>

<format>
Write between 2 and 6 distinct insights. Start each insight on its own line with
Insight N: <short summary of at most ten words>
followed by two to four sentences explaining the insight, paraphrasing the participants closely enough that their words can be found in the excerpts. No preamble, no conclusion.
</format>

<question>
{question}
</question>

<excerpts>
"#,
        question = question.text
    )
}
