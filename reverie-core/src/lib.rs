//! Session controller for the reverie analyst chat
//!
//! This crate provides:
//! - **Input capture**: `PendingInput` with one text buffer and optional image/audio `Attachment`s
//! - **Recording**: `RecordingController`, an idle/recording state machine over an `AudioSource`
//! - **Turn log**: `TurnLog`, the single ordered record from which both the visible
//!   `Message` list and the model context are derived
//! - **Session**: `SessionController`, which assembles requests, reconciles batch or
//!   streamed replies and reports progress as `SessionEvent`s
pub mod error;
pub mod input;
pub mod persona;
pub mod recording;
pub mod session;
pub mod turn_log;

pub use error::SessionError;
pub use input::{Attachment, AttachmentKind, PendingInput};
pub use recording::{RecordingController, RecordingState};
pub use session::{SendOutcome, SessionController, SessionEvent, SkipReason};
pub use turn_log::{Message, MessageRole, Turn, TurnLog, TurnStatus};
