//! The remote analysis service.
//!
//! The session controller only talks to [`ChatBackend`]; [`HttpBackend`] is
//! the production implementation over the service's REST API.

mod http;
pub mod multipart;
mod types;

use thiserror::Error;

pub use http::HttpBackend;
pub(crate) use http::map_ureq_error;
pub use types::{
    BoundingBox, ChatRequest, ChatResponse, HistoryRecord, ImageUpload, ResponseBody,
    SpatialMetrics, VisionMetadata,
};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Server returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Chat and history endpoints of the analysis service.
pub trait ChatBackend: Send + Sync {
    /// Submit one chat turn.
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError>;

    /// Fetch the stored sessions of an authenticated user.
    fn history(&self, user_id: &str) -> Result<Vec<HistoryRecord>, BackendError>;
}
