//! Text-to-speech backends.

mod http;

pub use http::{HttpSynthesizer, build_speech_request};
