//! Structured response parsing.
//!
//! Splits a free-form model reply into titled sections ("blocks"). A header
//! is a line that starts with an uppercase letter, continues with letters,
//! spaces, parentheses or slashes, and ends at a colon:
//!
//! ```text
//! Observation: A cat sits.
//! Reasoning: It looks calm.
//! ```
//!
//! Replies without usable structure come back as a single observation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Za-z\s()/]+):(.*)$").unwrap());

/// A titled section of an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub title: String,
    pub content: String,
}

impl Block {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Case-insensitive substring match against the block title.
    pub fn title_contains(&self, fragment: &str) -> bool {
        self.title
            .to_lowercase()
            .contains(&fragment.to_lowercase())
    }
}

/// Result of parsing a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParsedResponse {
    /// Ordered sections, repeated titles kept.
    Blocks { blocks: Vec<Block> },

    /// No usable structure; the whole reply is one observation.
    #[serde(rename_all = "camelCase")]
    Fallback {
        observation: String,
        full_text: String,
    },
}

impl ParsedResponse {
    fn fallback(text: &str) -> Self {
        ParsedResponse::Fallback {
            observation: text.to_string(),
            full_text: text.to_string(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        match self {
            ParsedResponse::Blocks { blocks } => blocks,
            ParsedResponse::Fallback { .. } => &[],
        }
    }

    /// First block whose title contains `fragment` (case-insensitive).
    pub fn find_block(&self, fragment: &str) -> Option<&Block> {
        self.blocks().iter().find(|b| b.title_contains(fragment))
    }
}

/// Parse a reply into blocks or the fallback form.
///
/// Lines before the first header belong to no block and are dropped. A lone
/// block whose content is under half of the input length is treated as a
/// stray colon rather than structure.
pub fn parse_response(text: &str) -> ParsedResponse {
    let mut blocks: Vec<Block> = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in text.lines() {
        if let Some(captures) = HEADER_RE.captures(line) {
            if let Some((title, lines)) = current.take() {
                blocks.push(finish_block(title, lines));
            }
            let title = captures[1].trim().to_string();
            let first = captures[2].trim().to_string();
            current = Some((title, vec![first]));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line.to_string());
        }
    }

    if let Some((title, lines)) = current.take() {
        blocks.push(finish_block(title, lines));
    }

    match blocks.len() {
        0 => ParsedResponse::fallback(text),
        1 if blocks[0].content.chars().count() * 2 < text.chars().count() => {
            ParsedResponse::fallback(text)
        }
        _ => ParsedResponse::Blocks { blocks },
    }
}

fn finish_block(title: String, lines: Vec<String>) -> Block {
    Block {
        title,
        content: lines.join("\n").trim().to_string(),
    }
}
