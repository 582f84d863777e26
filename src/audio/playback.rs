//! Audio playback to system speakers via cpal.
//!
//! cpal streams are not `Send` on every platform, so each clip plays on its
//! own thread which owns the stream from creation to drop. Stopping joins
//! that thread, so the device is released when `stop` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, StreamTrait};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info};

use super::wav::Clip;
use crate::error::{ChatError, Result};
use crate::voice::AudioHandle;

type Outcome = Option<std::result::Result<(), String>>;

/// One decoded clip bound to an output device.
pub struct CpalPlayer {
    clip: Arc<Clip>,
    output_device: Option<String>,
    started: AtomicBool,
    stop: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
    done_tx: watch::Sender<Outcome>,
}

impl std::fmt::Debug for CpalPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalPlayer")
            .field("sample_rate", &self.clip.sample_rate)
            .field("channels", &self.clip.channels)
            .field("samples", &self.clip.samples.len())
            .finish()
    }
}

impl CpalPlayer {
    /// Wrap a clip. Nothing touches the device until [`AudioHandle::play`].
    pub fn new(clip: Clip, output_device: Option<String>) -> Self {
        let (done_tx, _) = watch::channel(None);
        Self {
            clip: Arc::new(clip),
            output_device,
            started: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
            done_tx,
        }
    }

    /// Raise the stop flag and wait for the playback thread to drop the
    /// stream.
    fn halt(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let thread = match self.thread.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(thread) = thread
            && thread.join().is_err()
        {
            error!("playback thread panicked");
        }
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        super::device_names(super::Direction::Output)
    }
}

#[async_trait]
impl AudioHandle for CpalPlayer {
    async fn play(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (init_tx, init_rx) = oneshot::channel();
        let clip = Arc::clone(&self.clip);
        let device = self.output_device.clone();
        let stop = Arc::clone(&self.stop);
        let done_tx = self.done_tx.clone();

        let thread = std::thread::Builder::new()
            .name("bruti-playback".into())
            .spawn(move || {
                let outcome = run_output(&clip, device.as_deref(), &stop, init_tx);
                finish(&done_tx, outcome.map_err(|e| e.message().to_owned()));
            })
            .map_err(|e| ChatError::Playback(format!("failed to spawn playback thread: {e}")))?;
        match self.thread.lock() {
            Ok(mut slot) => *slot = Some(thread),
            Err(poisoned) => *poisoned.into_inner() = Some(thread),
        }

        match init_rx.await {
            Ok(result) => result,
            Err(_) => Err(ChatError::Playback("playback thread exited early".into())),
        }
    }

    async fn finished(&self) -> Result<()> {
        let mut rx = self.done_tx.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ChatError::Playback("playback channel closed".into()))?
            .clone();
        match outcome {
            Some(Err(message)) => Err(ChatError::Playback(message)),
            _ => Ok(()),
        }
    }

    fn stop(&self) {
        self.halt();
        if !self.started.load(Ordering::SeqCst) {
            finish(&self.done_tx, Ok(()));
        }
    }
}

impl Drop for CpalPlayer {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Record the first outcome only.
fn finish(done_tx: &watch::Sender<Outcome>, outcome: std::result::Result<(), String>) {
    done_tx.send_if_modified(|current| {
        if current.is_some() {
            return false;
        }
        *current = Some(outcome);
        true
    });
}

/// Open the device, play the clip to the end (or until stopped), then drop
/// the stream. Runs on the playback thread.
fn run_output(
    clip: &Clip,
    device_name: Option<&str>,
    stop: &AtomicBool,
    init_tx: oneshot::Sender<Result<()>>,
) -> Result<()> {
    let stream = match open_stream(clip, device_name) {
        Ok(stream) => {
            let _ = init_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            let message = e.message().to_owned();
            let _ = init_tx.send(Err(e));
            return Err(ChatError::Playback(message));
        }
    };
    let (stream, buffer) = stream;

    loop {
        std::thread::sleep(Duration::from_millis(10));
        if stop.load(Ordering::SeqCst) {
            debug!("playback stopped");
            break;
        }
        let buf = buffer
            .lock()
            .map_err(|e| ChatError::Playback(format!("playback buffer lock poisoned: {e}")))?;
        if let Some(message) = &buf.error {
            return Err(ChatError::Playback(message.clone()));
        }
        if buf.finished {
            break;
        }
    }

    drop(stream);
    Ok(())
}

fn open_stream(
    clip: &Clip,
    device_name: Option<&str>,
) -> Result<(cpal::Stream, Arc<Mutex<PlaybackBuffer>>)> {
    let device = super::select_device(super::Direction::Output, device_name)
        .map_err(|e| ChatError::Playback(e.message().to_owned()))?;

    let stream_config = StreamConfig {
        channels: clip.channels,
        sample_rate: clip.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples: clip.samples.clone(),
        position: 0,
        finished: false,
        error: None,
    }));
    let data_buffer = Arc::clone(&buffer);
    let error_buffer = Arc::clone(&buffer);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let Ok(mut buf) = data_buffer.lock() else {
                    return;
                };
                buf.fill(data);
            },
            move |err| {
                error!("audio output stream error: {err}");
                if let Ok(mut buf) = error_buffer.lock() {
                    buf.error = Some(err.to_string());
                }
            },
            None,
        )
        .map_err(|e| ChatError::Playback(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| ChatError::Playback(format!("failed to start output stream: {e}")))?;

    info!(
        sample_rate = clip.sample_rate,
        channels = clip.channels,
        seconds = clip.duration_secs(),
        "playback started"
    );
    Ok((stream, buffer))
}

/// Playback progress shared with the output callback.
struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
    error: Option<String>,
}

impl PlaybackBuffer {
    /// Copy the next samples into `out`, padding with silence once drained.
    fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            if let Some(&next) = self.samples.get(self.position) {
                *sample = next;
                self.position += 1;
            } else {
                *sample = 0.0;
                self.finished = true;
            }
        }
    }
}
