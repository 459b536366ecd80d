//! Session controller: request assembly and response reconciliation
//!
//! `SessionController` is a cloneable handle. State lives behind a plain mutex
//! that is never held across an await, so the visible state between awaits is
//! always consistent and concurrent callers observe the in-flight guard.

use config::{FailedTurnPolicy, SessionOptions};
use futures::StreamExt;
use llm::{ChatModel, ChatRequest};
use reverie_audio::AudioSource;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::input::{Attachment, AttachmentKind, PendingInput, read_attachment};
use crate::persona::{self, MICROPHONE_ALERT};
use crate::recording::RecordingController;
use crate::turn_log::{Message, TurnLog, TurnStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new bubble at `index` of the message list
    MessageAppended { index: usize, message: Message },
    /// Streamed text appended to the bubble at `index`
    MessageUpdated { index: usize, delta: String },
    LoadingChanged(bool),
    RecordingChanged(bool),
    AttachmentStaged(AttachmentKind),
    AttachmentCleared(AttachmentKind),
    /// Needs the user's attention outside the conversation
    Alert(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// A previous send has not finished
    InFlight,
    /// No text, image or audio staged
    NothingPending,
}

#[derive(Debug)]
pub enum SendOutcome {
    Skipped(SkipReason),
    Replied,
    /// The fallback message was shown in place of a reply
    Failed(SessionError),
}

/// Why a call failed, and the model bubble it had already opened, if any
struct CallFailure {
    error: SessionError,
    partial: Option<usize>,
}

impl CallFailure {
    fn hidden(error: SessionError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

#[derive(Default)]
struct SessionState {
    input: PendingInput,
    log: TurnLog,
    /// Display flag: off once the first reply text is visible
    loading: bool,
    /// Held from send until the turn is settled
    in_flight: bool,
}

/// Settles an abandoned send. Dropped without `disarm` (the send future was
/// cancelled), it fails the turn's pending entries and clears both flags.
struct InFlightGuard<'a> {
    session: &'a SessionController,
    user_index: usize,
    armed: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(session: &'a SessionController, user_index: usize) -> Self {
        Self {
            session,
            user_index,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let was_loading = {
            let mut state = self.session.state();
            let pending: Vec<usize> = state
                .log
                .turns()
                .iter()
                .enumerate()
                .skip(self.user_index)
                .filter(|(_, turn)| turn.status == TurnStatus::Pending)
                .map(|(index, _)| index)
                .collect();
            for index in pending {
                state.log.set_status(index, TurnStatus::Failed);
            }
            state.in_flight = false;
            std::mem::replace(&mut state.loading, false)
        };
        warn!(user_index = self.user_index, "Send abandoned before the turn settled");
        if was_loading {
            self.session.emit(SessionEvent::LoadingChanged(false));
        }
    }
}

struct Shared {
    model: Arc<dyn ChatModel + Send + Sync>,
    options: SessionOptions,
    recorder: RecordingController,
    state: Mutex<SessionState>,
    events: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
}

#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        model: Arc<dyn ChatModel + Send + Sync>,
        audio: Arc<dyn AudioSource>,
        options: SessionOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                model,
                options,
                recorder: RecordingController::new(audio),
                state: Mutex::new(SessionState::default()),
                events: Mutex::new(None),
            }),
        }
    }

    /// Receive session events from now on. A later call replaces the earlier receiver.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    pub fn options(&self) -> &SessionOptions {
        &self.shared.options
    }

    pub fn model_name(&self) -> &str {
        self.shared.model.name()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        let events = self.shared.events.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = events.as_ref() {
            let _ = tx.send(event);
        }
    }

    // --- input capture ---

    pub fn set_text(&self, text: impl Into<String>) {
        self.state().input.text = text.into();
    }

    fn stage(&self, kind: AttachmentKind, attachment: Attachment) {
        *self.state().input.slot_mut(kind) = Some(attachment);
        self.emit(SessionEvent::AttachmentStaged(kind));
    }

    fn clear(&self, kind: AttachmentKind) {
        let removed = self.state().input.slot_mut(kind).take();
        if removed.is_some() {
            self.emit(SessionEvent::AttachmentCleared(kind));
        }
    }

    /// Read an image file and stage it. On failure nothing is staged.
    pub async fn set_image(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        match read_attachment(path, AttachmentKind::Image).await {
            Ok(attachment) => {
                self.stage(AttachmentKind::Image, attachment);
                Ok(())
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Image error");
                Err(e)
            }
        }
    }

    /// Stage an image given as a `data:` URL
    pub fn set_image_data_url(&self, url: &str) -> Result<(), SessionError> {
        let attachment = Attachment::from_data_url(url)
            .and_then(|attachment| {
                if attachment.is_kind(AttachmentKind::Image) {
                    Ok(attachment)
                } else {
                    Err(SessionError::Decode(format!(
                        "{} is not an image type",
                        attachment.mime_type
                    )))
                }
            })
            .inspect_err(|e| error!(error = %e, "Image error"))?;
        self.stage(AttachmentKind::Image, attachment);
        Ok(())
    }

    pub fn clear_image(&self) {
        self.clear(AttachmentKind::Image);
    }

    pub fn set_audio(&self, attachment: Attachment) {
        self.stage(AttachmentKind::Audio, attachment);
    }

    /// Read an audio file and stage it as the voice note. On failure nothing is staged.
    pub async fn set_audio_file(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        match read_attachment(path, AttachmentKind::Audio).await {
            Ok(attachment) => {
                self.set_audio(attachment);
                Ok(())
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Audio file error");
                Err(e)
            }
        }
    }

    pub fn clear_audio(&self) {
        self.clear(AttachmentKind::Audio);
    }

    pub fn pending(&self) -> PendingInput {
        self.state().input.clone()
    }

    // --- recording ---

    pub fn is_recording(&self) -> bool {
        self.shared.recorder.is_recording()
    }

    /// Start a voice note. A refused microphone raises an alert and leaves the session idle.
    pub async fn start_recording(&self) -> Result<(), SessionError> {
        match self.shared.recorder.start().await {
            Ok(true) => {
                self.emit(SessionEvent::RecordingChanged(true));
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                error!(error = %e, "Mic access error");
                self.emit(SessionEvent::Alert(MICROPHONE_ALERT.to_string()));
                Err(e)
            }
        }
    }

    /// Stop the voice note and stage it as the audio attachment.
    /// Returns `Ok(None)` if nothing was recording or nothing was captured.
    pub async fn stop_recording(&self) -> Result<Option<Attachment>, SessionError> {
        let was_recording = self.is_recording();
        let result = self.shared.recorder.stop().await;
        if was_recording {
            self.emit(SessionEvent::RecordingChanged(false));
        }

        match result {
            Ok(Some(attachment)) => {
                self.set_audio(attachment.clone());
                Ok(Some(attachment))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                error!(error = %e, "Recording could not be finalized");
                Err(e)
            }
        }
    }

    pub async fn toggle_recording(&self) -> Result<(), SessionError> {
        if self.is_recording() {
            self.stop_recording().await.map(|_| ())
        } else {
            self.start_recording().await
        }
    }

    // --- views ---

    pub fn messages(&self) -> Vec<Message> {
        self.state().log.messages()
    }

    /// The turns the next request will replay
    pub fn history(&self) -> Vec<llm::ChatMessage> {
        self.state().log.context()
    }

    pub fn turn_log(&self) -> TurnLog {
        self.state().log.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    // --- request assembly ---

    /// Send everything staged as one user turn and reconcile the reply.
    pub async fn send(&self) -> SendOutcome {
        let (input, user_index, display, request) = {
            let mut state = self.state();
            if state.in_flight {
                debug!("Send ignored, a request is in flight");
                return SendOutcome::Skipped(SkipReason::InFlight);
            }
            if state.input.is_empty() {
                debug!("Send ignored, nothing pending");
                return SendOutcome::Skipped(SkipReason::NothingPending);
            }

            let input = std::mem::take(&mut state.input);
            let display = input.display_text();
            let user_index = state.log.push_user(input.to_parts(), display.clone());
            state.loading = true;
            state.in_flight = true;
            let request = ChatRequest::with_config(
                state.log.context(),
                persona::generation_config(&self.shared.options),
            );
            (input, user_index, display, request)
        };
        let guard = InFlightGuard::new(self, user_index);

        self.emit(SessionEvent::MessageAppended {
            index: user_index,
            message: Message::user(display),
        });
        for kind in input.staged_kinds() {
            self.emit(SessionEvent::AttachmentCleared(kind));
        }
        self.emit(SessionEvent::LoadingChanged(true));
        info!(
            model = self.shared.model.name(),
            turns = request.messages().len(),
            streaming = self.shared.options.streaming,
            "Sending turn"
        );

        let mut attempt = 0;
        let result = loop {
            let result = if self.shared.options.streaming {
                self.reconcile_stream(&request).await
            } else {
                self.reconcile_batch(&request).await
            };
            match result {
                Err(failure)
                    if failure.partial.is_none()
                        && attempt < self.shared.options.retry_attempts =>
                {
                    attempt += 1;
                    warn!(attempt, error = %failure.error, "Call failed, retrying");
                }
                other => break other,
            }
        };

        let outcome = match result {
            Ok(model_index) => {
                let mut state = self.state();
                state.log.set_status(user_index, TurnStatus::Committed);
                state.log.set_status(model_index, TurnStatus::Committed);
                state.in_flight = false;
                SendOutcome::Replied
            }
            Err(failure) => self.fail_turn(user_index, input, failure),
        };
        guard.disarm();
        outcome
    }

    /// Batch call: one complete reply, committed only if it has text
    async fn reconcile_batch(&self, request: &ChatRequest) -> Result<usize, CallFailure> {
        let reply = self
            .shared
            .model
            .chat(request)
            .await
            .map_err(|e| CallFailure::hidden(SessionError::analysis(e)))?;

        let text = reply.get_text();
        if text.is_empty() {
            return Err(CallFailure::hidden(SessionError::AnalysisFailure(
                "model returned an empty reply".to_string(),
            )));
        }

        let index = {
            let mut state = self.state();
            state.loading = false;
            state.log.push_model(text.clone(), TurnStatus::Pending)
        };
        self.emit(SessionEvent::LoadingChanged(false));
        self.emit(SessionEvent::MessageAppended {
            index,
            message: Message::model(text),
        });
        Ok(index)
    }

    /// Streaming call: the first non-empty fragment opens the model bubble,
    /// later fragments are appended to it in arrival order
    async fn reconcile_stream(&self, request: &ChatRequest) -> Result<usize, CallFailure> {
        let mut stream = self
            .shared
            .model
            .stream_chat(request)
            .await
            .map_err(|e| CallFailure::hidden(SessionError::analysis(e)))?;

        let mut model_index: Option<usize> = None;
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| CallFailure {
                error: SessionError::analysis(e),
                partial: model_index,
            })?;
            let delta = chunk.get_text();
            if delta.is_empty() {
                continue;
            }

            match model_index {
                None => {
                    let index = {
                        let mut state = self.state();
                        state.loading = false;
                        state.log.push_model(delta.clone(), TurnStatus::Pending)
                    };
                    self.emit(SessionEvent::LoadingChanged(false));
                    self.emit(SessionEvent::MessageAppended {
                        index,
                        message: Message::model(delta),
                    });
                    model_index = Some(index);
                }
                Some(index) => {
                    self.state().log.append_text(index, &delta);
                    self.emit(SessionEvent::MessageUpdated { index, delta });
                }
            }
        }

        model_index.ok_or_else(|| {
            CallFailure::hidden(SessionError::AnalysisFailure(
                "model stream ended without text".to_string(),
            ))
        })
    }

    /// Show the fallback message and settle the statuses according to policy
    fn fail_turn(&self, user_index: usize, input: PendingInput, failure: CallFailure) -> SendOutcome {
        error!(error = %failure.error, "API Call Error");
        let options = &self.shared.options;
        let fallback = persona::fallback_message(options.error_locale, input.trimmed_text());

        let (fallback_index, was_loading, restored) = {
            let mut state = self.state();
            if let Some(partial) = failure.partial {
                state.log.set_status(partial, TurnStatus::Failed);
            }
            let fallback_index = match options.failed_turn {
                FailedTurnPolicy::Omit => {
                    state.log.set_status(user_index, TurnStatus::Failed);
                    state.log.push_model(fallback.clone(), TurnStatus::Failed)
                }
                FailedTurnPolicy::Record => {
                    state.log.set_status(user_index, TurnStatus::Committed);
                    state.log.push_model(fallback.clone(), TurnStatus::Committed)
                }
            };
            let was_loading = std::mem::replace(&mut state.loading, false);
            state.in_flight = false;
            let restored = if options.restore_input_on_failure {
                restore_input(&mut state.input, input)
            } else {
                Vec::new()
            };
            (fallback_index, was_loading, restored)
        };

        if was_loading {
            self.emit(SessionEvent::LoadingChanged(false));
        }
        self.emit(SessionEvent::MessageAppended {
            index: fallback_index,
            message: Message::model(fallback),
        });
        for kind in restored {
            self.emit(SessionEvent::AttachmentStaged(kind));
        }

        SendOutcome::Failed(failure.error)
    }
}

/// Put a failed turn's input back into whichever slots are still empty.
/// Returns the attachment kinds that were restored.
fn restore_input(current: &mut PendingInput, previous: PendingInput) -> Vec<AttachmentKind> {
    if current.trimmed_text().is_empty() {
        current.text = previous.text;
    }
    let mut restored = Vec::new();
    for (kind, attachment) in [
        (AttachmentKind::Image, previous.image),
        (AttachmentKind::Audio, previous.audio),
    ] {
        let slot = current.slot_mut(kind);
        if slot.is_none() && attachment.is_some() {
            *slot = attachment;
            restored.push(kind);
        }
    }
    restored
}
