use crate::error::AudioError;
use crate::types::CapturedAudio;

/// Something that can start a microphone capture session
pub trait AudioSource: Send + Sync {
    /// Acquire the input device and start buffering samples.
    fn open(&self) -> Result<Box<dyn ActiveCapture>, AudioError>;
}

/// A running capture session that exclusively owns the input device
pub trait ActiveCapture: Send {
    /// Stop capturing, release the device and return everything buffered so far.
    fn stop(self: Box<Self>) -> Result<CapturedAudio, AudioError>;
}
