use crate::error::AudioError;
use crate::traits::{ActiveCapture, AudioSource};

/// Stand-in source for builds without an audio backend
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyAudioSource;

impl DummyAudioSource {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSource for DummyAudioSource {
    fn open(&self) -> Result<Box<dyn ActiveCapture>, AudioError> {
        Err(AudioError::AccessDenied(
            "Audio capture is not available in this build (missing 'backend-cpal' feature)"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_source_denies_access() {
        let result = DummyAudioSource::new().open();
        assert!(matches!(result, Err(AudioError::AccessDenied(_))));
    }
}
