//! Microphone capture using cpal

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{error, info, warn};

use crate::error::AudioError;
use crate::traits::{ActiveCapture, AudioSource};
use crate::types::CapturedAudio;
use crate::utils::downmix_to_mono;

type ChunkBuffer = Arc<Mutex<Vec<Vec<f32>>>>;

/// Convert samples to f32 format
fn convert_samples<T, F>(data: &[T], convert_fn: F) -> Vec<f32>
where
    T: Copy,
    F: Fn(T) -> f32,
{
    data.iter().map(|&sample| convert_fn(sample)).collect()
}

fn build_and_run_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    chunks: ChunkBuffer,
    convert_fn: F,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    F: Fn(T) -> f32 + Send + 'static,
{
    let channels = config.channels as usize;
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mono = downmix_to_mono(&convert_samples(data, &convert_fn), channels);
            match chunks.lock() {
                Ok(mut chunks) => chunks.push(mono),
                Err(poisoned) => poisoned.into_inner().push(mono),
            }
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )?;

    stream.play()?;
    info!("Audio stream started and playing");
    Ok(stream)
}

/// Build and start an input stream in whichever sample format the device prefers
fn start_stream(device: &Device, chunks: ChunkBuffer) -> Result<(cpal::Stream, u32)> {
    let supported = device.default_input_config()?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    macro_rules! handle_format {
        ($sample_type:ty, $converter:expr) => {
            build_and_run_stream::<$sample_type, _>(device, &config, chunks, $converter)
        };
    }

    let stream = match sample_format {
        SampleFormat::I8 => handle_format!(i8, |sample| f32::from(sample) / i8::MAX as f32),
        SampleFormat::I16 => handle_format!(i16, |sample| f32::from(sample) / i16::MAX as f32),
        SampleFormat::I32 => handle_format!(i32, |sample| (sample as f32) / i32::MAX as f32),
        SampleFormat::U8 => handle_format!(u8, |sample| {
            (f32::from(sample) - (1u8 << 7) as f32) / ((1u8 << 7) - 1) as f32
        }),
        SampleFormat::U16 => handle_format!(u16, |sample| {
            (f32::from(sample) - (1u16 << 15) as f32) / ((1u16 << 15) - 1) as f32
        }),
        SampleFormat::F32 => handle_format!(f32, |sample| sample),
        SampleFormat::F64 => handle_format!(f64, |sample| sample as f32),
        _ => Err(anyhow::anyhow!("Unsupported sample format: {:?}", sample_format)),
    }?;

    Ok((stream, config.sample_rate.0))
}

/// Capture from the default input device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalAudioSource;

impl CpalAudioSource {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSource for CpalAudioSource {
    /// Spawns a dedicated thread to own the audio stream (cpal::Stream is !Send).
    /// The stream lives until the capture is stopped or dropped.
    fn open(&self) -> Result<Box<dyn ActiveCapture>, AudioError> {
        let chunks: ChunkBuffer = Arc::new(Mutex::new(Vec::new()));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

        let thread_chunks = chunks.clone();
        let thread = std::thread::spawn(move || {
            info!("Audio capture thread started");
            let host = cpal::default_host();
            let Some(device) = host.default_input_device() else {
                let _ = ready_tx.send(Err("No audio input device".to_string()));
                return;
            };

            let _stream = match start_stream(&device, thread_chunks) {
                Ok((stream, sample_rate)) => {
                    let _ = ready_tx.send(Ok(sample_rate));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };

            // The stream is owned by this thread and is dropped, releasing the device, on exit
            match stop_rx.recv() {
                Ok(_) => info!("Audio capture thread received stop signal"),
                Err(e) => warn!("Audio capture thread stop channel closed: {}", e),
            }
            info!("Audio capture thread exiting");
        });

        let sample_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(AudioError::AccessDenied(e));
            }
            Err(_) => return Err(AudioError::Capture("Audio thread failed to start".to_string())),
        };

        Ok(Box::new(CpalCapture {
            stop_tx,
            thread: Some(thread),
            chunks,
            sample_rate,
        }))
    }
}

/// A running cpal capture. Dropping it without `stop` still releases the device.
struct CpalCapture {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
    chunks: ChunkBuffer,
    sample_rate: u32,
}

impl ActiveCapture for CpalCapture {
    fn stop(mut self: Box<Self>) -> Result<CapturedAudio, AudioError> {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| AudioError::Capture("Audio capture thread panicked".to_string()))?;
        }

        let chunks = match self.chunks.lock() {
            Ok(mut chunks) => std::mem::take(&mut *chunks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        Ok(CapturedAudio::new(self.sample_rate, chunks))
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        // Signal the thread to stop
        let _ = self.stop_tx.send(());
    }
}
