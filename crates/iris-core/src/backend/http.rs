//! HTTP implementation of [`ChatBackend`].

use std::time::Duration;

use super::multipart::MultipartForm;
use super::types::{ChatRequest, ChatResponse, HistoryRecord, HistoryResponse};
use super::{BackendError, ChatBackend};
use crate::logging::{abbreviate, log_line, LogHandle};

const PREVIEW_LOG_CHARS: usize = 64;

/// Blocking client for `{base_url}/api/...`.
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    wire_log: LogHandle,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration, wire_log: LogHandle) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            wire_log,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Assemble the multipart body for a chat request.
    pub(crate) fn encode_chat(request: &ChatRequest) -> (String, Vec<u8>) {
        let mut form = MultipartForm::new()
            .text("query", &request.query)
            .text("mode", request.mode.wire_value())
            .optional_text("session_id", request.session_id.as_deref())
            .optional_text("user_id", request.user_id.as_deref())
            .optional_text("image_preview", request.image_preview.as_deref());

        if let Some(image) = &request.image {
            form = form.file("image", &image.file_name, &image.media_type, &image.bytes);
        }

        form.finish()
    }
}

/// Map a ureq error into our taxonomy, pulling `detail` out of JSON error bodies.
pub(crate) fn map_ureq_error(err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
                .unwrap_or(body);
            BackendError::Status { status, detail }
        }
        ureq::Error::Transport(t) => BackendError::Transport(t.to_string()),
    }
}

impl ChatBackend for HttpBackend {
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let url = self.url("/api/chat");
        let (content_type, body) = Self::encode_chat(request);

        log_line(
            &self.wire_log,
            "REQUEST",
            &format!(
                "POST {} query={:?} mode={} session={:?} image={} preview={}",
                url,
                request.query,
                request.mode.wire_value(),
                request.session_id,
                request
                    .image
                    .as_ref()
                    .map(|i| format!("{} ({} bytes)", i.file_name, i.bytes.len()))
                    .unwrap_or_else(|| "-".to_string()),
                request
                    .image_preview
                    .as_deref()
                    .map(|p| abbreviate(p, PREVIEW_LOG_CHARS))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        );

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", &content_type)
            .send_bytes(&body)
            .map_err(map_ureq_error)
            .inspect_err(|e| log_line(&self.wire_log, "ERROR", &e.to_string()))?;

        let text = response
            .into_string()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        log_line(&self.wire_log, "RESPONSE", &abbreviate(&text, 2048));

        serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn history(&self, user_id: &str) -> Result<Vec<HistoryRecord>, BackendError> {
        let url = self.url(&format!("/api/auth/history/{}", user_id));
        log_line(&self.wire_log, "REQUEST", &format!("GET {}", url));

        let response = self.agent.get(&url).call().map_err(map_ureq_error)?;
        let parsed: HistoryResponse = response
            .into_json()
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        log_line(
            &self.wire_log,
            "RESPONSE",
            &format!("{} history records", parsed.history.len()),
        );
        Ok(parsed.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ImageUpload;
    use crate::logging::disabled;
    use crate::mode::Mode;

    fn request() -> ChatRequest {
        ChatRequest {
            query: "Analyze this image.".to_string(),
            image: None,
            session_id: None,
            user_id: None,
            mode: Mode::Storytelling,
            image_preview: None,
        }
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/", Duration::from_secs(5), disabled());
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.url("/api/chat"), "http://localhost:8000/api/chat");
    }

    #[test]
    fn encode_chat_includes_required_fields_only() {
        let (content_type, body) = HttpBackend::encode_chat(&request());
        let body = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("multipart/form-data; boundary="));
        assert!(body.contains("name=\"query\"\r\n\r\nAnalyze this image."));
        assert!(body.contains("name=\"mode\"\r\n\r\nMODE 1: STORYTELLING"));
        assert!(!body.contains("name=\"session_id\""));
        assert!(!body.contains("name=\"user_id\""));
        assert!(!body.contains("name=\"image\""));
    }

    #[test]
    fn encode_chat_includes_optional_fields() {
        let mut req = request();
        req.session_id = Some("s-1".into());
        req.user_id = Some("42".into());
        req.image_preview = Some("data:image/png;base64,AA==".into());
        req.image = Some(ImageUpload {
            file_name: "cat.png".into(),
            media_type: "image/png".into(),
            bytes: b"PNGDATA".to_vec(),
        });

        let (_, body) = HttpBackend::encode_chat(&req);
        let body = String::from_utf8(body).unwrap();

        assert!(body.contains("name=\"session_id\"\r\n\r\ns-1"));
        assert!(body.contains("name=\"user_id\"\r\n\r\n42"));
        assert!(body.contains("name=\"image_preview\"\r\n\r\ndata:image/png;base64,AA=="));
        assert!(body.contains("filename=\"cat.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA"));
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let backend = HttpBackend::new("http://127.0.0.1:9", Duration::from_millis(500), disabled());
        let err = backend.chat(&request()).unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
