//! SessionController - owns the active session and drives every transition.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::region::{ImageBounds, Point, RegionDrag};
use super::state::{Insights, Message, Region, Session};
use crate::auth::{AuthError, AuthProvider, UserIdentity};
use crate::backend::{BackendError, ChatBackend, ChatRequest, ChatResponse, HistoryRecord, ImageUpload};
use crate::event_bus::{EventBus, SessionEvent};
use crate::image::AttachedImage;
use crate::mode::Mode;
use crate::parser::parse_response;
use crate::persistence::{
    clear_guest_snapshot, load_guest_snapshot, save_guest_snapshot, GuestSnapshot, KeyValueStore,
};
use crate::speech::{ReadAloud, SpeechError, SpeechEvent, SpeechTarget};

/// Query used by a plain send with nothing typed.
pub const ANALYZE_PROMPT: &str = "Analyze this image.";

/// Query used right after a mode is picked.
pub const INITIALIZE_PROMPT: &str = "Initialize reasoning engine.";

/// Assistant reply shown when a chat request fails.
pub const FALLBACK_REPLY: &str =
    "I couldn't reach the analysis engine. Check your connection and try again.";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Mode is already locked to {0}")]
    ModeLocked(Mode),

    #[error("A mode must be chosen")]
    InvalidMode,

    #[error("Nothing to send")]
    NothingToSend,

    #[error("A request is already in flight")]
    Busy,

    #[error("Regions can only be drawn on the latest image")]
    RegionUnavailable,

    #[error("Nothing to read at {0:?}")]
    NoSpeechTarget(SpeechTarget),

    #[error(transparent)]
    Speech(#[from] SpeechError),
}

/// A request that has been committed to the session but not answered yet.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub generation: u64,
    pub request: ChatRequest,
    uploads_image: bool,
}

/// How a send ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Assistant reply appended at `index`
    Replied { index: usize },
    /// Fallback reply appended at `index`
    Failed { index: usize },
    /// The session was reset or replaced while the request was out
    Discarded,
}

/// Single owner of the active [`Session`].
///
/// All mutation goes through `&mut self`; the backend call is the only
/// blocking step and can be run elsewhere via [`begin_send`] and
/// [`complete_send`].
///
/// [`begin_send`]: SessionController::begin_send
/// [`complete_send`]: SessionController::complete_send
pub struct SessionController {
    session: Session,
    identity: Option<UserIdentity>,
    history: Vec<HistoryRecord>,
    region_drag: Option<RegionDrag>,
    voice_output: bool,
    backend: Arc<dyn ChatBackend>,
    store: Arc<dyn KeyValueStore>,
    read_aloud: ReadAloud,
    bus: Arc<EventBus>,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        store: Arc<dyn KeyValueStore>,
        read_aloud: ReadAloud,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            session: Session::new(),
            identity: None,
            history: Vec::new(),
            region_drag: None,
            voice_output: false,
            backend,
            store,
            read_aloud,
            bus,
        }
    }

    /// Read every reply aloud as it arrives.
    pub fn with_voice_output(mut self, enabled: bool) -> Self {
        self.voice_output = enabled;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn speaking(&self) -> Option<SpeechTarget> {
        self.read_aloud.speaking()
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Adopt the identity observed at startup.
    ///
    /// Guests get their last session restored from the store; signed-in
    /// users get their history list fetched instead.
    pub fn start(&mut self, identity: Option<UserIdentity>) {
        self.identity = identity;
        if self.identity.is_some() {
            self.refresh_history();
        } else {
            self.restore_guest_session();
        }
    }

    pub fn sign_in(
        &mut self,
        auth: &dyn AuthProvider,
        username: &str,
        password: &str,
    ) -> Result<UserIdentity, AuthError> {
        let identity = auth.sign_in(username, password)?;
        self.adopt_identity(identity)
    }

    pub fn sign_up(
        &mut self,
        auth: &dyn AuthProvider,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<UserIdentity, AuthError> {
        let identity = auth.sign_up(username, password, email)?;
        self.adopt_identity(identity)
    }

    /// Sign out and start over as a guest.
    pub fn sign_out(&mut self, auth: &dyn AuthProvider) -> Result<(), AuthError> {
        auth.sign_out()?;
        self.identity = None;
        self.history.clear();
        self.reset();
        Ok(())
    }

    fn adopt_identity(&mut self, identity: UserIdentity) -> Result<UserIdentity, AuthError> {
        self.identity = Some(identity.clone());
        self.refresh_history();
        Ok(identity)
    }

    /// Re-fetch the signed-in user's history. Failures leave it empty.
    pub fn refresh_history(&mut self) -> &[HistoryRecord] {
        let Some(identity) = &self.identity else {
            self.history.clear();
            return &self.history;
        };
        self.history = match self.backend.history(&identity.id) {
            Ok(records) => {
                log::debug!("Loaded {} history records for {}", records.len(), identity.id);
                records
            }
            Err(e) => {
                log::warn!("Failed to load history for {}: {}", identity.id, e);
                Vec::new()
            }
        };
        &self.history
    }

    fn restore_guest_session(&mut self) {
        let snapshot = match load_guest_snapshot(self.store.as_ref()) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                log::warn!("Ignoring unreadable guest session: {}", e);
                return;
            }
        };
        log::info!(
            "Restored guest session with {} messages",
            snapshot.messages.len()
        );
        self.session.session_id = snapshot.session_id;
        self.session.image_preview = snapshot.image_preview;
        self.session.messages = snapshot.messages;
        // Only the preview survives; there are no bytes left to upload.
        self.session.image_synced = true;
        self.bus.emit(SessionEvent::SessionResumed {
            session_id: self.session.session_id.clone().unwrap_or_default(),
        });
    }

    // ------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------

    /// Lock the session's mode. Only legal once.
    pub fn select_mode(&mut self, mode: Mode) -> Result<(), SessionError> {
        if !mode.is_set() {
            return Err(SessionError::InvalidMode);
        }
        if self.session.is_mode_locked() {
            return Err(SessionError::ModeLocked(self.session.mode));
        }
        self.session.mode = mode;
        log::info!("Mode locked: {}", mode);
        self.bus.emit(SessionEvent::ModeLocked { mode });
        Ok(())
    }

    /// Attach (or replace) the image. The next send uploads it.
    pub fn attach_image(&mut self, image: AttachedImage) {
        log::info!(
            "Attached {} ({} bytes, {})",
            image.file_name,
            image.byte_size(),
            image
                .resolution
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown size".to_string())
        );
        self.bus.emit(SessionEvent::ImageAttached {
            file_name: image.file_name.clone(),
            byte_size: image.byte_size(),
        });
        self.session.image_preview = Some(image.preview.clone());
        self.session.attached_image = Some(image);
        self.session.image_synced = false;
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.session.input = text.into();
    }

    // ------------------------------------------------------------------
    // Region of interest
    // ------------------------------------------------------------------

    /// Start a drag on the image of message `message_index`.
    pub fn begin_region_select(
        &mut self,
        message_index: usize,
        point: Point,
        bounds: ImageBounds,
    ) -> Result<(), SessionError> {
        if self.session.latest_image_message() != Some(message_index) || bounds.is_empty() {
            return Err(SessionError::RegionUnavailable);
        }
        self.region_drag = Some(RegionDrag::begin(bounds, point));
        Ok(())
    }

    /// Move the drag; returns the rectangle to draw.
    pub fn update_region_select(&mut self, point: Point) -> Option<Region> {
        let drag = self.region_drag.as_mut()?;
        drag.update(point);
        Some(drag.rect())
    }

    /// Finish the drag. Clicks and slivers leave the current region alone.
    pub fn end_region_select(&mut self) -> Option<Region> {
        let rect = self.region_drag.take()?.rect();
        if rect.is_negligible() {
            log::debug!("Ignoring negligible region {:?}", rect);
            return None;
        }
        self.session.region_of_interest = Some(rect);
        Some(rect)
    }

    pub fn clear_region(&mut self) {
        self.region_drag = None;
        self.session.region_of_interest = None;
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Commit a user turn and build the request for it.
    ///
    /// The query is `query_override`, else the input buffer, else
    /// `default_prompt`. A pending region is appended to the query and
    /// consumed. The user message is appended before the request goes out.
    pub fn begin_send(
        &mut self,
        query_override: Option<&str>,
        default_prompt: &str,
    ) -> Result<PendingSend, SessionError> {
        if self.session.in_flight {
            return Err(SessionError::Busy);
        }

        let typed = query_override
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .or_else(|| Some(self.session.input.trim()).filter(|q| !q.is_empty()))
            .map(str::to_string);
        if typed.is_none() && !self.session.has_image() {
            return Err(SessionError::NothingToSend);
        }
        let shown = typed.unwrap_or_else(|| default_prompt.to_string());

        let query = match self.session.region_of_interest.take() {
            Some(region) => format!("{} {}", shown, region.annotation()),
            None => shown.clone(),
        };

        let upload = match &self.session.attached_image {
            Some(image) if !self.session.image_synced => Some(ImageUpload {
                file_name: image.file_name.clone(),
                media_type: image.media_type.clone(),
                bytes: image.bytes.clone(),
            }),
            _ => None,
        };
        let message_image = upload
            .as_ref()
            .and(self.session.image_preview.clone());

        self.session.input.clear();
        self.push_message(Message::user(shown, message_image));
        self.session.in_flight = true;

        let generation = self.session.generation;
        self.bus.emit(SessionEvent::RequestStarted { generation });
        self.persist();

        Ok(PendingSend {
            generation,
            uploads_image: upload.is_some(),
            request: ChatRequest {
                query,
                image: upload,
                session_id: self.session.session_id.clone(),
                user_id: self.identity.as_ref().map(|i| i.id.clone()),
                mode: self.session.mode,
                image_preview: self.session.image_preview.clone(),
            },
        })
    }

    /// Apply the result of a request started by [`begin_send`].
    ///
    /// A result for an older generation changes nothing.
    ///
    /// [`begin_send`]: SessionController::begin_send
    pub fn complete_send(
        &mut self,
        pending: PendingSend,
        result: Result<ChatResponse, BackendError>,
    ) -> SendOutcome {
        let generation = pending.generation;
        if generation != self.session.generation {
            log::info!(
                "Discarding response for generation {} (now {})",
                generation,
                self.session.generation
            );
            self.bus.emit(SessionEvent::ResponseDiscarded { generation });
            return SendOutcome::Discarded;
        }

        let outcome = match result {
            Ok(response) => self.apply_response(pending.uploads_image, response),
            Err(e) => {
                log::error!("Chat request failed: {}", e);
                let index = self.push_message(Message::failure(FALLBACK_REPLY));
                SendOutcome::Failed { index }
            }
        };

        self.session.in_flight = false;
        self.bus.emit(SessionEvent::RequestFinished {
            generation,
            ok: matches!(outcome, SendOutcome::Replied { .. }),
        });
        self.persist();
        outcome
    }

    /// Send one turn and wait for the reply.
    ///
    /// Returns `None` when there was nothing to send or a request is
    /// already in flight.
    pub fn send(&mut self, query_override: Option<&str>) -> Option<SendOutcome> {
        self.send_with_default(query_override, ANALYZE_PROMPT)
    }

    /// The first turn after choosing a mode.
    pub fn initialize(&mut self) -> Option<SendOutcome> {
        self.send_with_default(None, INITIALIZE_PROMPT)
    }

    fn send_with_default(&mut self, query_override: Option<&str>, default_prompt: &str) -> Option<SendOutcome> {
        let pending = match self.begin_send(query_override, default_prompt) {
            Ok(pending) => pending,
            Err(e) => {
                log::debug!("Send skipped: {}", e);
                return None;
            }
        };
        let result = self.backend.chat(&pending.request);
        Some(self.complete_send(pending, result))
    }

    fn apply_response(&mut self, uploaded_image: bool, response: ChatResponse) -> SendOutcome {
        if !response.session_id.is_empty() {
            self.session.session_id = Some(response.session_id.clone());
        }
        if uploaded_image {
            self.session.image_synced = true;
        }
        if let Some(mode) = &response.response.mode {
            log::debug!("Reply produced in {} mode", mode);
        }
        self.refresh_insights(&response);

        let text = response.response.text;
        let suggestions = response.response.smart_suggestions.unwrap_or_default();
        let parsed = parse_response(&text);
        let index = self.push_message(Message::assistant(text, parsed, suggestions));

        if self.voice_output {
            let target = SpeechTarget::FullText { message: index };
            if let Err(e) = self.start_reading(target) {
                log::warn!("Could not read reply aloud: {}", e);
            }
        }
        SendOutcome::Replied { index }
    }

    fn refresh_insights(&mut self, response: &ChatResponse) {
        let insights = &mut self.session.insights;
        if let Some(summary) = &response.visual_summary {
            insights.visual_summary = Some(summary.clone());
        }
        if let Some(risk) = &response.risk_assessment {
            insights.risk_assessment = Some(risk.clone());
        }
        if let Some(narrative) = &response.narrative {
            insights.narrative = Some(narrative.clone());
        }
        if let Some(meta) = &response.vision_metadata {
            if let Some(objects) = &meta.detected_objects {
                insights.detected_objects = objects
                    .iter()
                    .map(|(label, confidence)| (label.clone(), *confidence))
                    .collect();
            }
            if let Some(metrics) = &meta.spatial_metrics {
                insights.complexity_score = Some(metrics.complexity_score);
                insights.object_count = Some(metrics.object_count);
            }
            if let Some(boxes) = &meta.bounding_boxes {
                insights.bounding_boxes = boxes.clone();
            }
        }
        self.bus.emit(SessionEvent::InsightsUpdated);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Drop everything and start a blank session.
    ///
    /// A request still in flight will be discarded when it completes.
    pub fn reset(&mut self) {
        self.read_aloud.stop();
        let generation = self.session.generation + 1;
        self.session = Session {
            generation,
            ..Session::default()
        };
        self.region_drag = None;
        if let Err(e) = clear_guest_snapshot(self.store.as_ref()) {
            log::warn!("Failed to clear guest session: {}", e);
        }
        log::info!("Session reset (generation {})", generation);
        self.bus.emit(SessionEvent::Reset { generation });
    }

    /// Replace the active session with a stored one. The mode is kept.
    pub fn resume_session(&mut self, record: HistoryRecord) {
        self.read_aloud.stop();
        self.region_drag = None;

        let session = &mut self.session;
        session.generation += 1;
        session.in_flight = false;
        session.session_id = Some(record.id.clone());
        session.image_preview = record.image_preview;
        session.messages = record.messages;
        session.attached_image = None;
        session.image_synced = true;
        session.region_of_interest = None;
        session.input.clear();
        session.insights = Insights::default();

        log::info!(
            "Resumed session {} ({} messages)",
            record.id,
            self.session.messages.len()
        );
        self.bus.emit(SessionEvent::SessionResumed {
            session_id: record.id,
        });
    }

    // ------------------------------------------------------------------
    // Read-aloud
    // ------------------------------------------------------------------

    /// Start reading `target`, or stop it if it is the one playing.
    pub fn toggle_read_aloud(&mut self, target: SpeechTarget) -> Result<Option<u64>, SessionError> {
        let text = self.speech_text(target)?;
        Ok(self.read_aloud.toggle(target, &text)?)
    }

    pub fn stop_reading(&mut self) {
        self.read_aloud.stop();
    }

    /// Drain playback signals and forward them to the bus.
    pub fn pump_speech(&mut self) -> Vec<SpeechEvent> {
        let events = self.read_aloud.poll();
        for event in &events {
            self.bus.emit(SessionEvent::Speech(*event));
        }
        events
    }

    fn start_reading(&mut self, target: SpeechTarget) -> Result<u64, SessionError> {
        let text = self.speech_text(target)?;
        Ok(self.read_aloud.start(target, &text)?)
    }

    fn speech_text(&self, target: SpeechTarget) -> Result<String, SessionError> {
        let text = match target {
            SpeechTarget::FullText { message } => self
                .session
                .messages
                .get(message)
                .map(|m| m.full_text().to_string()),
            SpeechTarget::Block { message, block } => self
                .session
                .messages
                .get(message)
                .and_then(|m| m.blocks.as_ref())
                .and_then(|blocks| blocks.get(block))
                .map(|b| format!("{}. {}", b.title, b.content)),
        };
        text.ok_or(SessionError::NoSpeechTarget(target))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn push_message(&mut self, message: Message) -> usize {
        let role = message.role;
        self.session.messages.push(message);
        let index = self.session.messages.len() - 1;
        self.bus.emit(SessionEvent::MessageAppended { index, role });
        index
    }

    /// Write the guest snapshot. Signed-in sessions live on the server.
    fn persist(&self) {
        if self.identity.is_some() || self.session.messages.is_empty() {
            return;
        }
        let snapshot = GuestSnapshot {
            session_id: self.session.session_id.clone(),
            image_preview: self.session.image_preview.clone(),
            messages: self.session.messages.clone(),
            last_updated: Utc::now(),
        };
        if let Err(e) = save_guest_snapshot(self.store.as_ref(), &snapshot) {
            log::warn!("Failed to save guest session: {}", e);
        }
    }
}
