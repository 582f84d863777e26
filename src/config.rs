//! Configuration types for the chat client.
//!
//! Everything has a working default except the API key, which is read from
//! the `GROQ_API_KEY` environment variable (or the config file) and checked
//! by [`ApiConfig::resolve_api_key`] before any request is made.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{ChatError, Result};
use crate::llm::persona;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Endpoint and credential settings shared by every API call.
    pub api: ApiConfig,
    /// Chat completion settings.
    pub completion: CompletionConfig,
    /// Speech-to-text settings.
    pub transcription: TranscriptionConfig,
    /// Text-to-speech settings.
    pub speech: SpeechConfig,
    /// Audio device settings.
    pub audio: AudioConfig,
}

/// Endpoint and credential settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL including the version segment, e.g. `https://api.groq.com/openai/v1`.
    pub base_url: String,
    /// API key from the config file. The environment variable takes precedence.
    pub api_key: String,
    /// Name of the environment variable consulted for the key.
    pub api_key_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_owned(),
            api_key: String::new(),
            api_key_env: API_KEY_ENV.to_owned(),
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &if self.api_key.is_empty() { "" } else { "[REDACTED]" },
            )
            .field("api_key_env", &self.api_key_env)
            .finish()
    }
}

impl ApiConfig {
    /// Return the API key, preferring the environment over the file value.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] when neither source provides a key.
    pub fn resolve_api_key(&self) -> Result<String> {
        let from_env = std::env::var(&self.api_key_env).ok();
        select_api_key(from_env, &self.api_key).ok_or_else(|| {
            ChatError::Config(format!(
                "{} is not set. Please add it to your environment variables.",
                self.api_key_env
            ))
        })
    }

    /// Join a path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn select_api_key(from_env: Option<String>, from_file: &str) -> Option<String> {
    from_env
        .filter(|k| !k.trim().is_empty())
        .or_else(|| Some(from_file.to_owned()).filter(|k| !k.trim().is_empty()))
        .map(|k| k.trim().to_owned())
}

/// Chat completion settings: model, sampling and persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Nucleus sampling probability.
    pub top_p: f64,
    /// Frequency penalty.
    pub frequency_penalty: f64,
    /// Presence penalty.
    pub presence_penalty: f64,
    /// Persona instruction sent as the system message.
    pub system_prompt: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-oss-20b".to_owned(),
            temperature: 1.6,
            max_tokens: 250,
            top_p: 0.9,
            frequency_penalty: 0.9,
            presence_penalty: 0.8,
            system_prompt: persona::SYSTEM_PROMPT.to_owned(),
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Transcription model identifier.
    pub model: String,
    /// Sampling temperature (0 = deterministic).
    pub temperature: f32,
    /// Response format requested from the endpoint.
    pub response_format: String,
    /// Optional ISO-639-1 language hint.
    pub language: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: "whisper-large-v3-turbo".to_owned(),
            temperature: 0.0,
            response_format: "verbose_json".to_owned(),
            language: None,
        }
    }
}

/// Text-to-speech settings for the bundled HTTP synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Provider name the synthesizer answers to. Requests naming another
    /// provider are refused so the voice chain moves on.
    pub provider: String,
    /// Speech model identifier.
    pub model: String,
    /// Voice per language tag, used when a request names a language but no
    /// voice.
    pub language_voices: BTreeMap<String, String>,
    /// Voice used when a request is a bare language tag.
    pub fallback_voice: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_owned(),
            model: "playai-tts".to_owned(),
            language_voices: BTreeMap::from([
                ("en-US".to_owned(), "Arista-PlayAI".to_owned()),
                ("fr-FR".to_owned(), "Celeste-PlayAI".to_owned()),
            ]),
            fallback_voice: "Fritz-PlayAI".to_owned(),
        }
    }
}

impl SpeechConfig {
    /// The voice configured for `language`, if any.
    pub fn voice_for_language(&self, language: &str) -> Option<&str> {
        self.language_voices.get(language).map(String::as_str)
    }
}

/// Audio device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of recorded clips sent for transcription, in Hz.
    pub input_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            input_device: None,
            output_device: None,
        }
    }
}

impl ChatConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| ChatError::Config(e.to_string()))
    }

    /// Load the default config file if present, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            tracing::info!(path = %path.display(), "loading config");
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path: `~/.config/bruti/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bruti")
            .join("config.toml")
    }
}
