//! Speech-to-text over the OpenAI-compatible transcription endpoint.
//!
//! A recorded clip is uploaded as a multipart form (`file`, `model`,
//! `temperature`, `response_format`, optional `language`) and the `text`
//! field of the JSON answer becomes the user's message.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{ApiConfig, ChatConfig, TranscriptionConfig};
use crate::error::{ChatError, NO_TRANSCRIPT, Result};
use crate::llm::client::map_http_error;

/// File name sent with the uploaded clip.
const UPLOAD_FILE_NAME: &str = "recording.wav";

/// Turns an encoded audio clip into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV clip.
    ///
    /// # Errors
    ///
    /// Fails if the request fails or no text comes back.
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// HTTP transcription client.
pub struct TranscriptionClient {
    url: String,
    api_key: String,
    config: TranscriptionConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for TranscriptionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionClient")
            .field("url", &self.url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl TranscriptionClient {
    /// Create a client, resolving the API key up front.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no API key is configured.
    pub fn new(api: &ApiConfig, config: TranscriptionConfig) -> Result<Self> {
        Ok(Self {
            url: api.endpoint("audio/transcriptions"),
            api_key: api.resolve_api_key()?,
            config,
            client: reqwest::Client::new(),
        })
    }

    /// Create a client from the full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no API key is configured.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::new(&config.api, config.transcription.clone())
    }

    fn form(&self, wav: Vec<u8>) -> Result<reqwest::multipart::Form> {
        let file = reqwest::multipart::Part::bytes(wav)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("audio/wav")
            .map_err(|e| ChatError::Transcription(format!("invalid upload part: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.config.model.clone())
            .text("temperature", self.config.temperature.to_string())
            .text("response_format", self.config.response_format.clone());
        if let Some(language) = &self.config.language {
            form = form.text("language", language.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl Transcriber for TranscriptionClient {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        let bytes = wav.len();
        let form = self.form(wav)?;

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChatError::Transcription(format!("transcription request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = map_http_error(status, &body);
            warn!(error = %err, "transcription rejected");
            return Err(ChatError::Transcription(err.message().to_owned()));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Transcription(format!("invalid transcription body: {e}")))?;

        let text = parsed.text.trim();
        if text.is_empty() {
            return Err(ChatError::Transcription(NO_TRANSCRIPT.into()));
        }

        info!(
            bytes,
            language = parsed.language.as_deref().unwrap_or("?"),
            duration = parsed.duration.unwrap_or_default(),
            text,
            "transcription received"
        );
        Ok(text.to_owned())
    }
}
