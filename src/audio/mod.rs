//! Audio capture and playback via cpal, plus in-memory WAV handling.

pub mod capture;
pub mod playback;
pub mod wav;

pub use capture::CpalCapture;
pub use playback::CpalPlayer;
pub use wav::{Clip, decode_wav, encode_wav};

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::info;

use crate::error::{ChatError, Result};

/// Substrings that identify a refused microphone in backend error text.
const PERMISSION_MARKERS: &[&str] = &["permission", "denied", "not allowed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    fn error(self, message: String) -> ChatError {
        match self {
            Self::Input => classify_capture_error(message),
            Self::Output => ChatError::Playback(message),
        }
    }
}

/// Map a capture failure to [`ChatError::PermissionDenied`] when the backend
/// text says access was refused, [`ChatError::Capture`] otherwise.
pub fn classify_capture_error(message: String) -> ChatError {
    let lower = message.to_lowercase();
    if PERMISSION_MARKERS.iter().any(|m| lower.contains(m)) {
        ChatError::PermissionDenied(message)
    } else {
        ChatError::Capture(message)
    }
}

/// Find the named device, or the host default when `name` is `None`.
pub(crate) fn select_device(direction: Direction, name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    let label = direction.label();

    let device = match name {
        Some(name) => {
            let mut devices = match direction {
                Direction::Input => host.input_devices(),
                Direction::Output => host.output_devices(),
            }
            .map_err(|e| direction.error(format!("cannot enumerate devices: {e}")))?;
            devices
                .find(|d| {
                    d.description()
                        .ok()
                        .is_some_and(|desc| desc.name() == name)
                })
                .ok_or_else(|| direction.error(format!("{label} device '{name}' not found")))?
        }
        None => match direction {
            Direction::Input => host.default_input_device(),
            Direction::Output => host.default_output_device(),
        }
        .ok_or_else(|| direction.error(format!("no default {label} device")))?,
    };

    let device_name = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());
    info!("using {label} device: {device_name}");
    Ok(device)
}

pub(crate) fn device_names(direction: Direction) -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = match direction {
        Direction::Input => host.input_devices(),
        Direction::Output => host.output_devices(),
    }
    .map_err(|e| direction.error(format!("cannot enumerate devices: {e}")))?;

    Ok(devices
        .filter_map(|d| d.description().ok().map(|desc| desc.name().to_owned()))
        .collect())
}
