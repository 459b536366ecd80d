use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    /// The input device could not be opened: no device, permission refused,
    /// or no usable stream configuration.
    #[error("Microphone access denied: {0}")]
    AccessDenied(String),

    #[error("Audio capture failed: {0}")]
    Capture(String),

    #[error("Failed to encode audio: {0}")]
    Encode(#[from] hound::Error),
}
