//! Per-session state.

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::image::AttachedImage;
use crate::mode::Mode;
use crate::parser::{Block, ParsedResponse};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in the conversation.
///
/// Field names follow the stored history format so records fetched from the
/// server and guest snapshots deserialize into the same type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "new_message_id")]
    pub id: String,

    pub role: Role,

    #[serde(alias = "text", default)]
    pub content: String,

    /// Preview reference when an image was part of this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Block>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    /// Display timestamp, e.g. "09:41 AM".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// True for the fallback reply of a failed request.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

fn display_timestamp() -> String {
    Local::now().format("%I:%M %p").to_string()
}

impl Message {
    pub fn user(content: impl Into<String>, image: Option<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: content.into(),
            image,
            blocks: None,
            observation: None,
            full_text: None,
            suggestions: Vec::new(),
            timestamp: Some(display_timestamp()),
            failed: false,
        }
    }

    /// Assistant reply carrying the parsed form of `text`.
    pub fn assistant(text: impl Into<String>, parsed: ParsedResponse, suggestions: Vec<String>) -> Self {
        let (blocks, observation, full_text) = match parsed {
            ParsedResponse::Blocks { blocks } => (Some(blocks), None, None),
            ParsedResponse::Fallback {
                observation,
                full_text,
            } => (None, Some(observation), Some(full_text)),
        };
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            content: text.into(),
            image: None,
            blocks,
            observation,
            full_text,
            suggestions,
            timestamp: Some(display_timestamp()),
            failed: false,
        }
    }

    /// Fallback reply appended when a request fails.
    pub fn failure(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut message = Self::assistant(
            text.clone(),
            ParsedResponse::Fallback {
                observation: text.clone(),
                full_text: text,
            },
            Vec::new(),
        );
        message.failed = true;
        message
    }

    /// The parsed view of an assistant reply, if it has one.
    pub fn response(&self) -> Option<ParsedResponse> {
        if let Some(blocks) = &self.blocks {
            return Some(ParsedResponse::Blocks {
                blocks: blocks.clone(),
            });
        }
        match (&self.observation, &self.full_text) {
            (Some(observation), full_text) => Some(ParsedResponse::Fallback {
                observation: observation.clone(),
                full_text: full_text.clone().unwrap_or_else(|| observation.clone()),
            }),
            (None, Some(full_text)) => Some(ParsedResponse::Fallback {
                observation: full_text.clone(),
                full_text: full_text.clone(),
            }),
            (None, None) => None,
        }
    }

    /// Text to read aloud for the whole message.
    pub fn full_text(&self) -> &str {
        self.full_text.as_deref().unwrap_or(&self.content)
    }
}

/// Normalized rectangle in `[0, 1]` image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    /// Rectangles thinner than this on either axis are treated as clicks.
    pub const MIN_EXTENT: f64 = 0.01;

    pub fn is_negligible(&self) -> bool {
        self.width < Self::MIN_EXTENT || self.height < Self::MIN_EXTENT
    }

    /// Bracketed annotation appended to the outgoing query.
    pub fn annotation(&self) -> String {
        format!(
            "[Region of interest: x={:.3}, y={:.3}, w={:.3}, h={:.3}]",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Summary panels refreshed from the last successful response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub visual_summary: Option<String>,
    pub risk_assessment: Option<String>,
    pub narrative: Option<String>,
    pub detected_objects: Vec<(String, f64)>,
    pub complexity_score: Option<f64>,
    pub object_count: Option<u64>,
    pub bounding_boxes: Vec<crate::backend::BoundingBox>,
}

/// State of a single analysis session.
///
/// Owned exclusively by [`super::SessionController`]; every field starts at
/// its `Default` value.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Assigned by the backend on the first successful exchange
    pub session_id: Option<String>,

    pub mode: Mode,

    pub attached_image: Option<AttachedImage>,

    /// Data URI currently shown. Survives without bytes after a resume.
    pub image_preview: Option<String>,

    /// True once the attached image bytes have reached the backend
    pub image_synced: bool,

    pub messages: Vec<Message>,

    pub region_of_interest: Option<Region>,

    /// Composer buffer
    pub input: String,

    pub insights: Insights,

    /// Bumped on every reset; stale responses carry an older value
    pub generation: u64,

    pub in_flight: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mode_locked(&self) -> bool {
        self.mode.is_set()
    }

    /// Most recent assistant message by position.
    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// Index of the most recent message carrying an image.
    pub fn latest_image_message(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.image.is_some())
    }

    pub fn has_image(&self) -> bool {
        self.attached_image.is_some() || self.image_preview.is_some()
    }
}
