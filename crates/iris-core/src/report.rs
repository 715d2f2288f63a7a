//! Report projection of an assistant reply.
//!
//! The report view shows a fixed set of fields. Each is filled from the
//! first block whose title contains a known fragment, or generic text when
//! the reply has no such block.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::parser::ParsedResponse;
use crate::session::Message;

static HIGHLIGHT_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\n•]").unwrap());

pub const KEY_METRICS: &str = "Key Metrics";
pub const KEY_POINTS: &str = "Key Points";
pub const NARRATIVE: &str = "Narrative";
pub const OBSERVATION: &str = "Observation";
pub const STEP_BY_STEP: &str = "Step-by-Step";
pub const IMAGE_OVERVIEW: &str = "Image Overview";

const NO_METRICS: &str = "No metrics reported for this analysis.";
const NO_SUMMARY: &str = "No analysis available yet.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub summary: String,
    pub key_metrics: String,
    pub highlights: Vec<String>,
    pub narrative: Option<String>,
    pub observation: Option<String>,
    pub step_by_step: Option<String>,
    pub image_overview: Option<String>,
    pub suggestions: Vec<String>,
}

impl Report {
    /// Build a report from an assistant message.
    pub fn from_message(message: &Message) -> Self {
        let parsed = message.response();
        let lookup = |fragment: &str| -> Option<String> {
            parsed
                .as_ref()
                .and_then(|p| p.find_block(fragment))
                .map(|b| b.content.clone())
        };

        let narrative = lookup(NARRATIVE);
        let observation = lookup(OBSERVATION);
        let step_by_step = lookup(STEP_BY_STEP);
        let image_overview = lookup(IMAGE_OVERVIEW);

        let fallback_text = match &parsed {
            Some(ParsedResponse::Fallback { full_text, .. }) => Some(full_text.clone()),
            _ => None,
        };

        let summary = [&narrative, &observation, &step_by_step, &image_overview, &fallback_text]
            .into_iter()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| NO_SUMMARY.to_string());

        Self {
            summary,
            key_metrics: lookup(KEY_METRICS).unwrap_or_else(|| NO_METRICS.to_string()),
            highlights: lookup(KEY_POINTS)
                .map(|points| highlights(&points))
                .unwrap_or_default(),
            narrative,
            observation,
            step_by_step,
            image_overview,
            suggestions: message.suggestions.clone(),
        }
    }

    /// Report for the latest assistant message, or an empty one.
    pub fn latest(messages: &[Message]) -> Self {
        messages
            .iter()
            .rev()
            .find(|m| m.role == crate::session::Role::Assistant)
            .map(Self::from_message)
            .unwrap_or_else(Self::empty)
    }

    pub fn empty() -> Self {
        Self {
            summary: NO_SUMMARY.to_string(),
            key_metrics: NO_METRICS.to_string(),
            highlights: Vec::new(),
            narrative: None,
            observation: None,
            step_by_step: None,
            image_overview: None,
            suggestions: Vec::new(),
        }
    }
}

/// Split a "Key Points" block into display highlights.
pub fn highlights(key_points: &str) -> Vec<String> {
    HIGHLIGHT_SPLIT_RE
        .split(key_points)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_response;

    fn assistant(text: &str) -> Message {
        Message::assistant(text, parse_response(text), vec!["Tell me more".into()])
    }

    mod highlights {
        use super::*;

        #[test]
        fn splits_on_commas_newlines_and_bullets() {
            let points = "Climax Element: the bridge, Emotional Anchor\n• The child • The dog";
            assert_eq!(
                highlights(points),
                vec![
                    "Climax Element: the bridge",
                    "Emotional Anchor",
                    "The child",
                    "The dog"
                ]
            );
        }

        #[test]
        fn discards_empty_fragments() {
            assert_eq!(highlights(",, \n•,a,"), vec!["a"]);
            assert!(highlights("").is_empty());
        }
    }

    mod report {
        use super::*;

        #[test]
        fn fields_come_from_matching_blocks() {
            let text = "Image Overview: A kitchen.\nKey Metrics (Visual Statistics): Spatial Balance 0.7\nKey Points (Visual Anchors): Stove, Window";
            let report = Report::from_message(&assistant(text));

            assert_eq!(report.image_overview.as_deref(), Some("A kitchen."));
            assert_eq!(report.key_metrics, "Spatial Balance 0.7");
            assert_eq!(report.highlights, vec!["Stove", "Window"]);
            assert_eq!(report.summary, "A kitchen.");
            assert_eq!(report.suggestions, vec!["Tell me more"]);
        }

        #[test]
        fn narrative_wins_summary() {
            let text = "Setting: woods\nThe Narrative (Interconnected Journey): Once upon a time.\nMoral of the Story: Be kind.";
            let report = Report::from_message(&assistant(text));
            assert_eq!(report.summary, "Once upon a time.");
            assert_eq!(report.narrative.as_deref(), Some("Once upon a time."));
        }

        #[test]
        fn fallback_reply_uses_full_text() {
            let report = Report::from_message(&assistant("Just a sentence."));
            assert_eq!(report.summary, "Just a sentence.");
            assert_eq!(report.key_metrics, NO_METRICS);
            assert!(report.highlights.is_empty());
        }

        #[test]
        fn latest_uses_most_recent_assistant_by_position() {
            let messages = vec![
                assistant("Observation: old\nReasoning: a"),
                Message::user("q", None),
                assistant("Observation: new\nReasoning: b"),
                Message::user("q2", None),
            ];
            assert_eq!(Report::latest(&messages).observation.as_deref(), Some("new"));
        }

        #[test]
        fn latest_without_assistant_is_empty() {
            assert_eq!(Report::latest(&[Message::user("q", None)]), Report::empty());
        }
    }
}
