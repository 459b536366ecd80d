use reverie_audio::AudioError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone could not be acquired
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    /// A file, data URL or recording could not be turned into an attachment
    #[error("Failed to decode attachment: {0}")]
    Decode(String),

    /// Transport failure, empty reply or a blocked response
    #[error("Analysis failed: {0}")]
    AnalysisFailure(String),
}

impl From<AudioError> for SessionError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::AccessDenied(reason) => SessionError::PermissionDenied(reason),
            other => SessionError::Decode(other.to_string()),
        }
    }
}

impl SessionError {
    pub(crate) fn analysis(err: anyhow::Error) -> Self {
        SessionError::AnalysisFailure(format!("{:#}", err))
    }
}
