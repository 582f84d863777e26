//! Microphone recording bridged to transcription.
//!
//! [`CaptureBridge`] owns the single capture slot. Starting acquires the
//! input device through an [`AudioSource`]; stopping releases it, encodes
//! what was heard as WAV and hands it to a [`Transcriber`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::audio::encode_wav;
use crate::error::{ChatError, NO_TRANSCRIPT, Result};
use crate::stt::Transcriber;

/// Audio gathered by one recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recorded {
    /// Mono samples in capture order.
    pub samples: Vec<f32>,
    /// Sample rate of `samples`.
    pub sample_rate: u32,
}

/// An input device that can be opened for recording.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Acquire the device and begin buffering.
    ///
    /// # Errors
    ///
    /// [`ChatError::PermissionDenied`] when access is refused,
    /// [`ChatError::Capture`] for any other device failure.
    async fn start(&self) -> Result<Box<dyn Recording>>;
}

/// A recording in progress. Dropping it releases the device.
#[async_trait]
pub trait Recording: Send {
    /// Release the device and return everything captured.
    async fn finish(self: Box<Self>) -> Result<Recorded>;
}

/// State of the capture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    /// No device held.
    #[default]
    Idle,
    /// The device is open and audio is being buffered.
    Recording,
    /// The device is released and the clip is being transcribed.
    Finalizing,
}

/// Result of [`CaptureBridge::toggle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Recording began.
    Started,
    /// Recording ended and produced this transcript.
    Transcribed(String),
}

/// Capture slot plus transcription.
pub struct CaptureBridge {
    source: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    state: RecordingState,
    active: Option<Box<dyn Recording>>,
}

impl std::fmt::Debug for CaptureBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureBridge")
            .field("state", &self.state)
            .finish()
    }
}

impl CaptureBridge {
    /// Create an idle bridge.
    pub fn new(source: Arc<dyn AudioSource>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            source,
            transcriber,
            state: RecordingState::Idle,
            active: None,
        }
    }

    /// Current slot state.
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Whether the microphone is held.
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Open the microphone.
    ///
    /// # Errors
    ///
    /// Fails if already recording or if the device cannot be acquired. The
    /// bridge stays idle on failure.
    pub async fn start_capture(&mut self) -> Result<()> {
        if self.state != RecordingState::Idle {
            return Err(ChatError::Busy("a recording is already in progress".into()));
        }

        match self.source.start().await {
            Ok(recording) => {
                self.active = Some(recording);
                self.state = RecordingState::Recording;
                info!("recording started");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "could not start recording");
                Err(e)
            }
        }
    }

    /// Release the microphone and transcribe what was recorded.
    ///
    /// # Errors
    ///
    /// Fails if nothing is recording, the recording cannot be finalised, or
    /// transcription fails or comes back empty. The bridge is idle afterwards
    /// in every case.
    pub async fn stop_capture(&mut self) -> Result<String> {
        let Some(recording) = self.active.take() else {
            return Err(ChatError::Capture("no recording in progress".into()));
        };
        self.state = RecordingState::Finalizing;

        let result = self.finalize(recording).await;
        self.state = RecordingState::Idle;
        if let Err(e) = &result {
            warn!(error = %e, "recording produced no transcript");
        }
        result
    }

    /// Start when idle, stop and transcribe when recording.
    ///
    /// # Errors
    ///
    /// As [`CaptureBridge::start_capture`] or [`CaptureBridge::stop_capture`].
    pub async fn toggle(&mut self) -> Result<CaptureOutcome> {
        if self.is_recording() {
            self.stop_capture().await.map(CaptureOutcome::Transcribed)
        } else {
            self.start_capture().await.map(|()| CaptureOutcome::Started)
        }
    }

    /// Drop the recording without transcribing. The device is released
    /// before this returns.
    pub fn cancel(&mut self) {
        if self.active.take().is_some() {
            info!("recording cancelled");
        }
        self.state = RecordingState::Idle;
    }

    async fn finalize(&self, recording: Box<dyn Recording>) -> Result<String> {
        let recorded = recording.finish().await?;
        if recorded.samples.is_empty() {
            return Err(ChatError::Transcription(NO_TRANSCRIPT.into()));
        }
        info!(
            samples = recorded.samples.len(),
            sample_rate = recorded.sample_rate,
            "recording stopped, transcribing"
        );
        let wav = encode_wav(&recorded.samples, recorded.sample_rate)?;
        self.transcriber.transcribe(wav).await
    }
}
