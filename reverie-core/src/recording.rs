//! Recording controller: one microphone session at a time, finalized into a WAV voice note

use reverie_audio::{ActiveCapture, AudioSource, CapturedAudio, WAV_MIME_TYPE, encode_wav};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::error::SessionError;
use crate::input::Attachment;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

enum Slot {
    Idle,
    /// Device acquisition in progress
    Opening,
    Recording(Box<dyn ActiveCapture>),
}

pub struct RecordingController {
    source: Arc<dyn AudioSource>,
    slot: Mutex<Slot>,
}

impl RecordingController {
    pub fn new(source: Arc<dyn AudioSource>) -> Self {
        Self {
            source,
            slot: Mutex::new(Slot::Idle),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> RecordingState {
        match *self.slot() {
            Slot::Recording(_) => RecordingState::Recording,
            Slot::Idle | Slot::Opening => RecordingState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Acquire the microphone and start buffering.
    ///
    /// Returns `Ok(false)` if a session is already active or being opened.
    /// On failure the controller stays idle.
    pub async fn start(&self) -> Result<bool, SessionError> {
        {
            let mut slot = self.slot();
            if !matches!(*slot, Slot::Idle) {
                debug!("Recording already active, ignoring start");
                return Ok(false);
            }
            *slot = Slot::Opening;
        }

        let source = Arc::clone(&self.source);
        let opened = tokio::task::spawn_blocking(move || source.open())
            .await
            .map_err(|e| SessionError::PermissionDenied(format!("capture task failed: {}", e)))
            .and_then(|result| result.map_err(SessionError::from));

        let mut slot = self.slot();
        match opened {
            Ok(capture) => {
                *slot = Slot::Recording(capture);
                info!("Recording started");
                Ok(true)
            }
            Err(e) => {
                *slot = Slot::Idle;
                Err(e)
            }
        }
    }

    /// Stop the active session, release the device and encode what was captured.
    ///
    /// Returns `Ok(None)` when idle (no-op) or when no audio arrived.
    pub async fn stop(&self) -> Result<Option<Attachment>, SessionError> {
        let capture = {
            let mut slot = self.slot();
            match std::mem::replace(&mut *slot, Slot::Idle) {
                Slot::Recording(capture) => capture,
                other => {
                    *slot = other;
                    debug!("No active recording, ignoring stop");
                    return Ok(None);
                }
            }
        };

        let audio = tokio::task::spawn_blocking(move || capture.stop())
            .await
            .map_err(|e| SessionError::Decode(format!("capture task failed: {}", e)))??;

        info!(duration_ms = audio.duration_ms(), "Recording stopped");
        finalize(&audio)
    }
}

/// Turn buffered chunks into one voice note. A capture with no samples left
/// after resampling stages nothing.
fn finalize(audio: &CapturedAudio) -> Result<Option<Attachment>, SessionError> {
    let Some(wav) = encode_wav(audio)? else {
        debug!(duration_ms = audio.duration_ms(), "Recording captured no audio, nothing staged");
        return Ok(None);
    };
    Ok(Some(Attachment::from_bytes(&wav, WAV_MIME_TYPE)))
}
