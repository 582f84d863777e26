//! Microphone audio capture using cpal.
//!
//! Captures at the device's native sample rate and downsamples to the
//! configured input rate (16kHz mono by default) before the clip is encoded
//! for transcription. The cpal stream lives on its own thread for the whole
//! recording. Finishing or dropping the recording joins that thread, so the
//! microphone is released before either returns.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::{Direction, classify_capture_error, select_device};
use crate::capture::{AudioSource, Recorded, Recording};
use crate::config::AudioConfig;
use crate::error::{ChatError, Result};

/// A block of captured mono samples at the target rate.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono samples.
    pub samples: Vec<f32>,
    /// Sample rate of `samples`.
    pub sample_rate: u32,
}

/// Audio capture from the system microphone via cpal.
#[derive(Debug, Clone)]
pub struct CpalCapture {
    input_device: Option<String>,
    target_sample_rate: u32,
}

impl CpalCapture {
    /// Create a capture source. The device is opened on [`AudioSource::start`].
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            input_device: config.input_device.clone(),
            target_sample_rate: config.input_sample_rate,
        }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        super::device_names(Direction::Input)
    }
}

#[async_trait]
impl AudioSource for CpalCapture {
    async fn start(&self) -> Result<Box<dyn Recording>> {
        let (init_tx, init_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let device = self.input_device.clone();
        let target_rate = self.target_sample_rate;

        let thread = std::thread::Builder::new()
            .name("bruti-capture".into())
            .spawn(move || run_input(device.as_deref(), target_rate, chunk_tx, stop_rx, init_tx))
            .map_err(|e| ChatError::Capture(format!("failed to spawn capture thread: {e}")))?;

        match init_rx.await {
            Ok(Ok(())) => Ok(Box::new(CpalRecording {
                stop_tx,
                thread: Some(thread),
                chunk_rx,
                sample_rate: target_rate,
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(ChatError::Capture("capture thread exited early".into())),
        }
    }
}

/// A recording in progress on the capture thread.
struct CpalRecording {
    stop_tx: std_mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
    chunk_rx: mpsc::UnboundedReceiver<AudioChunk>,
    sample_rate: u32,
}

#[async_trait]
impl Recording for CpalRecording {
    async fn finish(mut self: Box<Self>) -> Result<Recorded> {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| ChatError::Capture(format!("capture join failed: {e}")))?
                .map_err(|_| ChatError::Capture("capture thread panicked".into()))?;
        }

        let mut samples = Vec::new();
        while let Ok(chunk) = self.chunk_rx.try_recv() {
            samples.extend_from_slice(&chunk.samples);
        }
        info!(samples = samples.len(), "audio capture stopped");
        Ok(Recorded {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

impl Drop for CpalRecording {
    /// Stop the capture thread and wait for it to drop the stream.
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("capture thread panicked");
        }
    }
}

/// Capture thread body: open the stream, report readiness, hold the stream
/// until told to stop.
fn run_input(
    device_name: Option<&str>,
    target_rate: u32,
    tx: mpsc::UnboundedSender<AudioChunk>,
    stop_rx: std_mpsc::Receiver<()>,
    init_tx: oneshot::Sender<Result<()>>,
) {
    let stream = match open_input(device_name, target_rate, tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };
    let _ = init_tx.send(Ok(()));

    // Either a stop message or a dropped recording ends the capture.
    let _ = stop_rx.recv();
    drop(stream);
    debug!("input stream released");
}

fn open_input(
    device_name: Option<&str>,
    target_rate: u32,
    tx: mpsc::UnboundedSender<AudioChunk>,
) -> Result<cpal::Stream> {
    let device = select_device(Direction::Input, device_name)?;

    let default_config = device
        .default_input_config()
        .map_err(|e| classify_capture_error(format!("no default input config: {e}")))?;
    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();

    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if native_channels > 1 {
                    to_mono(data, native_channels)
                } else {
                    data.to_vec()
                };
                let samples = downsample(&mono, native_rate, target_rate);
                let chunk = AudioChunk {
                    samples,
                    sample_rate: target_rate,
                };
                if tx.send(chunk).is_err() {
                    debug!("capture receiver gone, dropping chunk");
                }
            },
            move |err| {
                error!("audio input stream error: {err}");
            },
            None,
        )
        .map_err(|e| classify_capture_error(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| classify_capture_error(format!("failed to start input stream: {e}")))?;

    info!(native_rate, native_channels, target_rate, "audio capture started");
    Ok(stream)
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation resampler. Speech energy sits below 8kHz, so no
/// anti-alias filter is applied when going down to 16kHz.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() || dst_rate == 0 {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            match samples.get(idx + 1) {
                Some(&next) => (samples[idx] as f64 * (1.0 - frac) + next as f64 * frac) as f32,
                None => samples[idx.min(samples.len() - 1)],
            }
        })
        .collect()
}
