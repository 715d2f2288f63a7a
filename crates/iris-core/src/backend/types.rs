//! Wire types for the chat and history endpoints.
//!
//! Every optional field defaults so a sparse or partially malformed reply
//! still decodes; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::mode::Mode;
use crate::session::Message;

/// Image part of a chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// One logical chat call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub query: String,
    /// Present only while the attachment is not yet synced
    pub image: Option<ImageUpload>,
    pub session_id: Option<String>,
    /// Only for authenticated identities
    pub user_id: Option<String>,
    pub mode: Mode,
    pub image_preview: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub response: ResponseBody,
    #[serde(default)]
    pub vision_metadata: Option<VisionMetadata>,
    #[serde(default)]
    pub visual_summary: Option<String>,
    #[serde(default)]
    pub risk_assessment: Option<String>,
    #[serde(default)]
    pub narrative: Option<String>,
    #[serde(default)]
    pub latency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub smart_suggestions: Option<Vec<String>>,
    #[serde(default)]
    pub has_list: Option<bool>,
    /// "hybrid" or "local" when the backend degraded
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionMetadata {
    #[serde(default)]
    pub bounding_boxes: Option<Vec<BoundingBox>>,
    #[serde(default)]
    pub detected_objects: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub spatial_metrics: Option<SpatialMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialMetrics {
    #[serde(default)]
    pub complexity_score: f64,
    #[serde(default)]
    pub object_count: u64,
}

/// A past session as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    #[serde(default)]
    pub image_preview: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}
