//! Microphone capture for reverie
//!
//! This crate provides:
//! - The capture seam (`AudioSource` / `ActiveCapture`)
//! - Capture from the default input device via `cpal` (feature: `backend-cpal`)
//! - WAV encoding of a finished recording

pub mod encode;
pub mod error;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(feature = "backend-cpal")]
pub mod cpal_backend;

#[cfg(not(feature = "backend-cpal"))]
pub mod dummy_backend;

pub use encode::{WAV_MIME_TYPE, encode_wav};
pub use error::AudioError;
pub use traits::{ActiveCapture, AudioSource};
pub use types::CapturedAudio;

// Default backend exports
#[cfg(feature = "backend-cpal")]
pub use cpal_backend::CpalAudioSource as DefaultAudioSource;

#[cfg(not(feature = "backend-cpal"))]
pub use dummy_backend::DummyAudioSource as DefaultAudioSource;
