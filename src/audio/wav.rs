//! In-memory WAV encoding and decoding.
//!
//! Recorded clips are uploaded as 16-bit PCM WAV. Synthesized replies come
//! back as WAV and are decoded to interleaved `f32` samples for cpal.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::error::{ChatError, Result};

/// Decoded PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Interleaved samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

impl Clip {
    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Encode mono `f32` samples as a 16-bit PCM WAV file.
///
/// # Errors
///
/// Returns [`ChatError::Capture`] if the writer fails.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = WavWriter::new(&mut cursor, spec)
        .map_err(|e| ChatError::Capture(format!("failed to create WAV writer: {e}")))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|e| ChatError::Capture(format!("failed to write sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| ChatError::Capture(format!("failed to finalize WAV: {e}")))?;

    debug!(samples = samples.len(), sample_rate, "encoded WAV");
    Ok(cursor.into_inner())
}

/// Decode a WAV file held in memory.
///
/// # Errors
///
/// Returns [`ChatError::Playback`] for malformed or unsupported data.
pub fn decode_wav(bytes: &[u8]) -> Result<Clip> {
    let mut reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| ChatError::Playback(format!("invalid WAV data: {e}")))?;
    let spec = reader.spec();

    let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect(),
        SampleFormat::Int => {
            let scale = match spec.bits_per_sample {
                8 => i8::MAX as f32,
                16 => i16::MAX as f32,
                24 => 8_388_607.0,
                32 => i32::MAX as f32,
                other => {
                    return Err(ChatError::Playback(format!(
                        "unsupported bit depth: {other}"
                    )));
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect()
        }
    };
    let samples = samples.map_err(|e| ChatError::Playback(format!("invalid WAV sample: {e}")))?;

    debug!(
        samples = samples.len(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        "decoded WAV"
    );
    Ok(Clip {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}
