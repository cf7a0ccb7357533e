//! Splits a generated narrative into insight points.
//!
//! Marker grammar, version 1. A marker is found at the start of a line
//! indented by at most three spaces. Three marker families are tried in
//! order and the first family present in the narrative is used:
//!
//! 1. `Insight N` markers, optionally behind `#` headings and `**`/`__`
//!    emphasis, optionally followed by `.`, `)`, `:` or a dash.
//! 2. Numbered list items: `N.`, `N)` or `N:` followed by whitespace.
//! 3. Markdown headings: `#` to `######` followed by text.
//!
//! `N` has one to three digits. Each point runs from its marker to the next
//! marker; text before the first marker belongs to the first point, so the
//! point spans partition the narrative. A narrative without any marker is a
//! single point, and an empty narrative has none.

use std::ops::Range;

use regex::Regex;

use decode_core::config::AttributionConfig;
use decode_core::error::{DecodeError, Result};
use decode_core::types::InsightPoint;

pub const MARKER_GRAMMAR_VERSION: u32 = 1;

const INSIGHT_MARKER: &str = r"(?im)^([ \t]{0,3}(?:#{1,6}[ \t]*)?(?:\*\*|__)?[ \t]*insight[ \t]*\d{1,3}[ \t]*(?:\*\*|__)?[ \t]*[.):\-–—]?[ \t]*(?:\*\*|__)?)(?:[ \t]+|\r?$)";
const LIST_MARKER: &str =
    r"(?m)^([ \t]{0,3}(?:\*\*|__)?\d{1,3}[.):](?:\*\*|__)?)(?:[ \t]+|\r?$)";
const HEADING_MARKER: &str = r"(?m)^([ \t]{0,3}#{1,6}[ \t]+)[^\s#]";
const EXPLICIT_SUMMARY: &str =
    r"(?im)^[ \t>*_#-]*summary[ \t]*(?:\*\*|__)?[ \t]*[:\-–—][ \t]*(.*\S)";

const ELLIPSIS: &str = "...";

/// Narrative segmenter and summary extractor.
#[derive(Debug, Clone)]
pub struct InsightSegmenter {
    markers: [Regex; 3],
    explicit_summary: Regex,
    max_summary_chars: usize,
}

impl InsightSegmenter {
    pub fn new(max_summary_chars: usize) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| DecodeError::Config(format!("invalid marker pattern: {}", e)))
        };
        Ok(Self {
            markers: [
                compile(INSIGHT_MARKER)?,
                compile(LIST_MARKER)?,
                compile(HEADING_MARKER)?,
            ],
            explicit_summary: compile(EXPLICIT_SUMMARY)?,
            max_summary_chars: max_summary_chars.max(ELLIPSIS.len() + 1),
        })
    }

    pub fn from_config(config: &AttributionConfig) -> Result<Self> {
        Self::new(config.max_summary_chars)
    }

    /// Split `narrative` into ordered insight points.
    pub fn segment(&self, narrative: &str) -> Vec<InsightPoint> {
        if narrative.trim().is_empty() {
            return Vec::new();
        }

        let markers = self.find_markers(narrative);
        if markers.is_empty() {
            let span = 0..narrative.len();
            return vec![self.point(narrative, 1, span, None)];
        }

        let mut points = Vec::with_capacity(markers.len());
        for (i, marker) in markers.iter().enumerate() {
            let start = if i == 0 { 0 } else { marker.start };
            let end = markers
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(narrative.len());
            points.push(self.point(narrative, i + 1, start..end, Some(marker.clone())));
        }
        points
    }

    /// Marker ranges of the first marker family present in `narrative`.
    fn find_markers(&self, narrative: &str) -> Vec<Range<usize>> {
        for pattern in &self.markers {
            let found: Vec<Range<usize>> = pattern
                .captures_iter(narrative)
                .filter_map(|caps| caps.get(1).map(|m| m.range()))
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    fn point(
        &self,
        narrative: &str,
        ordinal: usize,
        span: Range<usize>,
        marker: Option<Range<usize>>,
    ) -> InsightPoint {
        let text = narrative[span.clone()].trim().to_string();
        let summary = self.summarize(narrative, &span, marker);
        InsightPoint {
            ordinal,
            span,
            text,
            summary,
        }
    }

    /// Short headline of the point covering `span`.
    ///
    /// An explicit `Summary:` line wins. Otherwise the text on the marker
    /// line is used when the point continues below it. Otherwise the first
    /// clause of the point, bounded to `max_summary_chars`.
    fn summarize(&self, narrative: &str, span: &Range<usize>, marker: Option<Range<usize>>) -> String {
        // A folded preamble never labels the first point.
        let own_start = marker.as_ref().map_or(span.start, |m| m.start);
        let text = &narrative[own_start..span.end];
        if let Some(explicit) = self
            .explicit_summary
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| clean(m.as_str()))
            .filter(|s| !s.is_empty())
        {
            return self.bound(&explicit);
        }

        let body = match marker {
            Some(marker) => {
                let after = &narrative[marker.end..span.end];
                let (line, rest) = after.split_once('\n').unwrap_or((after, ""));
                let label = clean(line);
                if !label.is_empty() && !rest.trim().is_empty() {
                    return self.bound(&label);
                }
                after
            }
            None => text,
        };
        self.bound(&leading_clause(&clean(body)))
    }

    /// Cut `text` at a word boundary so that it fits `max_summary_chars`
    /// including the trailing ellipsis.
    fn bound(&self, text: &str) -> String {
        if text.chars().count() <= self.max_summary_chars {
            return text.to_string();
        }

        let keep = self.max_summary_chars - ELLIPSIS.len();
        let prefix: String = text.chars().take(keep).collect();
        let at_boundary = text.chars().nth(keep).is_some_and(char::is_whitespace);
        let cut = if at_boundary {
            prefix.as_str()
        } else {
            match prefix.rfind(char::is_whitespace) {
                Some(space) if space > 0 => &prefix[..space],
                _ => prefix.as_str(),
            }
        };
        let cut = cut.trim_end().trim_end_matches([',', ';', ':', '-']);
        format!("{}{}", cut.trim_end(), ELLIPSIS)
    }
}

/// Collapse whitespace and strip markdown emphasis and heading artifacts.
fn clean(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let unemphasized = collapsed.replace("**", "").replace("__", "");
    unemphasized
        .trim_matches(|c: char| c == '*' || c == '_' || c == '#' || c.is_whitespace())
        .trim_end_matches(':')
        .trim_end()
        .to_string()
}

/// Text up to the first sentence or clause end, without its punctuation.
fn leading_clause(text: &str) -> String {
    let end = [". ", "! ", "? ", "; "]
        .iter()
        .filter_map(|terminator| text.find(terminator))
        .min()
        .unwrap_or(text.len());
    text[..end]
        .trim_end_matches(['.', '!', '?', ';'])
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> InsightSegmenter {
        InsightSegmenter::new(80).unwrap()
    }

    fn assert_partition(narrative: &str, points: &[InsightPoint]) {
        let mut cursor = 0;
        for point in points {
            assert_eq!(point.span.start, cursor);
            cursor = point.span.end;
        }
        assert_eq!(cursor, narrative.len());
    }

    #[test]
    fn test_empty_narrative_has_no_points() {
        assert!(segmenter().segment("").is_empty());
        assert!(segmenter().segment(" \n\n ").is_empty());
    }

    #[test]
    fn test_insight_markers() {
        let narrative = "Insight 1: Onboarding delighted users\n\
                         Users said they loved the onboarding flow.\n\n\
                         Insight 2: Pricing confused users\n\
                         Users found the pricing confusing and too high.\n";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].ordinal, 1);
        assert_eq!(points[0].summary, "Onboarding delighted users");
        assert_eq!(points[1].summary, "Pricing confused users");
        assert!(points[1].text.starts_with("Insight 2: Pricing"));
        assert!(points[1].text.ends_with("too high."));
        assert_partition(narrative, &points);
    }

    #[test]
    fn test_markdown_decorated_markers() {
        let narrative = "### **Insight 1:** Fast support\nTickets were answered quickly.\n\
                         **Insight 2: Slow dashboard**\nCharts took long to load.";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].summary, "Fast support");
        assert_eq!(points[1].summary, "Slow dashboard");
    }

    #[test]
    fn test_preamble_folds_into_first_point() {
        let narrative = "Here is what I found.\n\nInsight 1: Export saves time\nIt was praised.\n\
                         Insight 2: Search is weak\nNobody could find old notes.";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 2);
        assert!(points[0].text.starts_with("Here is what I found."));
        assert_eq!(points[0].summary, "Export saves time");
        assert_partition(narrative, &points);
    }

    #[test]
    fn test_numbered_list_markers() {
        let narrative = "1. Onboarding is loved. Users praised the checklist.\n\
                         2. Pricing is confusing. Plans overlap.\n\
                         3) Support is fast";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].summary, "Onboarding is loved");
        assert_eq!(points[1].summary, "Pricing is confusing");
        assert_eq!(points[2].summary, "Support is fast");
        assert_partition(narrative, &points);
    }

    #[test]
    fn test_insight_markers_win_over_nested_lists() {
        let narrative = "Insight 1: Pricing confuses\nReasons:\n1. plans overlap\n2. hidden fees\n\
                         Insight 2: Support is fast\nTickets close within the hour.";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 2);
        assert!(points[0].text.contains("2. hidden fees"));
    }

    #[test]
    fn test_heading_markers() {
        let narrative = "## Onboarding\nParticipants loved it.\n\n## Pricing\nParticipants were confused.";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].summary, "Onboarding");
        assert_eq!(points[1].summary, "Pricing");
    }

    #[test]
    fn test_no_markers_yields_single_point() {
        let narrative = "Participants consistently praised onboarding, but pricing confused them.";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].text, narrative);
        assert_eq!(points[0].span, 0..narrative.len());
    }

    #[test]
    fn test_explicit_summary_line_wins() {
        let narrative = "Insight 1: Something vague\nSummary: Users want fewer steps\nThey said so.";
        let points = segmenter().segment(narrative);
        assert_eq!(points[0].summary, "Users want fewer steps");
    }

    #[test]
    fn test_preamble_summary_does_not_label_first_point() {
        let narrative = "Summary: Users liked the product overall.\n\n\
                         Insight 1: Onboarding delighted users\n\
                         Users said they loved the onboarding flow.\n\
                         Insight 2: Pricing confused users\n\
                         Users found the pricing confusing.";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].summary, "Onboarding delighted users");
        assert_eq!(points[1].summary, "Pricing confused users");
        assert!(points[0].text.starts_with("Summary: Users liked"));
        assert_partition(narrative, &points);
    }

    #[test]
    fn test_marker_line_only_uses_leading_clause() {
        let narrative = "Insight 1: Users loved onboarding. It felt quick.";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].summary, "Users loved onboarding");
    }

    #[test]
    fn test_long_summary_cut_at_word_boundary() {
        let segmenter = InsightSegmenter::new(30).unwrap();
        let narrative = "Participants repeatedly described the onboarding checklist as the most helpful part";
        let points = segmenter.segment(narrative);
        let summary = &points[0].summary;
        assert!(summary.chars().count() <= 30, "{summary}");
        assert!(summary.ends_with("..."));
        assert_eq!(summary, "Participants repeatedly...");
    }

    #[test]
    fn test_unbroken_long_word_is_hard_cut() {
        let segmenter = InsightSegmenter::new(10).unwrap();
        let points = segmenter.segment(&"x".repeat(40));
        assert_eq!(points[0].summary, "xxxxxxx...");
    }

    #[test]
    fn test_marker_requires_line_start() {
        let narrative = "As noted in insight 1: users care. And point 2. matters too.";
        let points = segmenter().segment(narrative);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_grammar_version() {
        assert_eq!(MARKER_GRAMMAR_VERSION, 1);
    }
}
