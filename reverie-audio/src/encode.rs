//! Voice note container: 16 kHz mono 16-bit PCM WAV

use std::io::Cursor;

use crate::error::AudioError;
use crate::types::CapturedAudio;
use crate::utils::{TARGET_SAMPLE_RATE, resample_to_16khz};

pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Encode a finished recording as an in-memory WAV file.
/// Returns `None` when no samples survive resampling.
pub fn encode_wav(audio: &CapturedAudio) -> Result<Option<Vec<u8>>, AudioError> {
    if audio.is_empty() {
        return Ok(None);
    }
    let samples = resample_to_16khz(&audio.samples(), audio.sample_rate);
    if samples.is_empty() {
        return Ok(None);
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    Ok(Some(cursor.into_inner()))
}
