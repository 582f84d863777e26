//! Spoken replies: language detection, voice choice, the synthesis fallback
//! chain and playback exclusivity.

pub mod chain;
pub mod language;
pub mod preference;
pub mod selector;

pub use chain::{AudioHandle, SpeechSynthesizer, SynthesisOptions, SynthesisRequest, synthesis_chain};
pub use language::{Language, detect_language};
pub use preference::{VoiceOption, VoicePreference, VoiceSelection, resolve_voice};
pub use selector::{PlaybackStarted, PlaybackState, VoicePlaybackSelector};
