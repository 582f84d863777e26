//! HTTP speech synthesis against the OpenAI-compatible `audio/speech`
//! endpoint.
//!
//! The endpoint knows a single provider and its own voice names. Requests
//! naming another provider, or a voice the service rejects, fail so the
//! voice chain moves to the next shape.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::audio::{CpalPlayer, decode_wav};
use crate::config::{ApiConfig, ChatConfig, SpeechConfig};
use crate::error::{ChatError, Result};
use crate::llm::client::map_http_error;
use crate::voice::{AudioHandle, SpeechSynthesizer, SynthesisRequest};

/// Audio container requested from the endpoint.
const RESPONSE_FORMAT: &str = "wav";

/// Build the JSON request body for one synthesis attempt.
///
/// The endpoint takes a voice but no language or engine, so the language
/// picks the voice: a voice-less request uses the voice configured for its
/// language, a bare language tag uses the fallback voice. A shape that would
/// only repeat another one is refused.
///
/// # Errors
///
/// Returns [`ChatError::Playback`] when no voice is configured for the
/// language, or when the fallback voice is the language's own voice.
pub fn build_speech_request(
    config: &SpeechConfig,
    text: &str,
    request: &SynthesisRequest,
) -> Result<serde_json::Value> {
    let language = request.language();
    let voice = match request {
        SynthesisRequest::Options(options) => match options.voice.as_deref() {
            Some(voice) => voice,
            None => config.voice_for_language(language).ok_or_else(|| {
                ChatError::Playback(format!("no voice configured for {language}"))
            })?,
        },
        SynthesisRequest::Language(_) => {
            if config.voice_for_language(language) == Some(config.fallback_voice.as_str()) {
                return Err(ChatError::Playback(format!(
                    "fallback voice already tried for {language}"
                )));
            }
            &config.fallback_voice
        }
    };

    Ok(serde_json::json!({
        "model": config.model,
        "input": text,
        "voice": voice,
        "response_format": RESPONSE_FORMAT,
    }))
}

/// Speech synthesizer backed by the HTTP endpoint, playing through cpal.
pub struct HttpSynthesizer {
    url: String,
    api_key: String,
    config: SpeechConfig,
    output_device: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSynthesizer")
            .field("url", &self.url)
            .field("provider", &self.config.provider)
            .field("model", &self.config.model)
            .finish()
    }
}

impl HttpSynthesizer {
    /// Create a synthesizer, resolving the API key up front.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no API key is configured.
    pub fn new(api: &ApiConfig, config: SpeechConfig, output_device: Option<String>) -> Result<Self> {
        Ok(Self {
            url: api.endpoint("audio/speech"),
            api_key: api.resolve_api_key()?,
            config,
            output_device,
            client: reqwest::Client::new(),
        })
    }

    /// Create a synthesizer from the full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no API key is configured.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::new(
            &config.api,
            config.speech.clone(),
            config.audio.output_device.clone(),
        )
    }

    /// Fetch and decode the clip for one request.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Playback`] for an unsupported provider, a failed
    /// request or undecodable audio.
    pub async fn fetch_clip(
        &self,
        text: &str,
        request: &SynthesisRequest,
    ) -> Result<crate::audio::Clip> {
        if let Some(provider) = request.provider()
            && !provider.eq_ignore_ascii_case(&self.config.provider)
        {
            return Err(ChatError::Playback(format!(
                "provider '{provider}' not available"
            )));
        }

        let body = build_speech_request(&self.config, text, request)?;
        debug!(voice = %body["voice"], "requesting speech");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Playback(format!("speech request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Playback(
                map_http_error(status, &body).message().to_owned(),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatError::Playback(format!("speech body read failed: {e}")))?;
        decode_wav(&bytes)
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    fn name(&self) -> &str {
        &self.config.provider
    }

    async fn synthesize(
        &self,
        text: &str,
        request: &SynthesisRequest,
    ) -> Result<Arc<dyn AudioHandle>> {
        let clip = self.fetch_clip(text, request).await?;
        Ok(Arc::new(CpalPlayer::new(clip, self.output_device.clone())))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::voice::chain::NEURAL_ENGINE;
    use crate::voice::{Language, SynthesisOptions, VoicePreference, resolve_voice, synthesis_chain};

    #[test]
    fn request_uses_named_voice() {
        let request = SynthesisRequest::Options(SynthesisOptions {
            voice: Some("Celeste-PlayAI".into()),
            language: "fr-FR".into(),
            ..SynthesisOptions::default()
        });
        let body = build_speech_request(&SpeechConfig::default(), "Salut", &request).unwrap();
        assert_eq!(body["voice"], "Celeste-PlayAI");
        assert_eq!(body["input"], "Salut");
        assert_eq!(body["model"], "playai-tts");
        assert_eq!(body["response_format"], "wav");
    }

    #[test]
    fn bare_language_request_uses_fallback_voice() {
        let request = SynthesisRequest::Language("en-US".into());
        let body = build_speech_request(&SpeechConfig::default(), "Hi", &request).unwrap();
        assert_eq!(body["voice"], "Fritz-PlayAI");
    }

    fn voiceless(language: &str) -> SynthesisRequest {
        SynthesisRequest::Options(SynthesisOptions {
            language: language.into(),
            engine: Some(NEURAL_ENGINE.into()),
            ..SynthesisOptions::default()
        })
    }

    #[test]
    fn tail_of_the_chain_sends_distinct_bodies() {
        let config = SpeechConfig::default();
        let selection = resolve_voice(&VoicePreference::Auto, Language::French);
        let chain = synthesis_chain(&VoicePreference::Auto, &selection, Language::French);
        let n = chain.len();

        let by_language = build_speech_request(&config, "Salut", &chain[n - 2]).unwrap();
        let bare = build_speech_request(&config, "Salut", &chain[n - 1]).unwrap();
        assert_eq!(by_language["voice"], "Celeste-PlayAI");
        assert_ne!(by_language, bare);
    }

    #[test]
    fn language_picks_the_voice() {
        let config = SpeechConfig::default();
        let french = build_speech_request(&config, "t", &voiceless("fr-FR")).unwrap();
        let english = build_speech_request(&config, "t", &voiceless("en-US")).unwrap();
        assert_ne!(french["voice"], english["voice"]);
        assert_eq!(english["voice"], "Arista-PlayAI");
    }

    #[test]
    fn unmapped_language_is_refused() {
        let err = build_speech_request(&SpeechConfig::default(), "t", &voiceless("de-DE"))
            .unwrap_err();
        assert_eq!(err.code(), "PLAYBACK_FAILED");
    }

    #[test]
    fn bare_language_repeating_the_language_voice_is_refused() {
        let mut config = SpeechConfig::default();
        config
            .language_voices
            .insert("en-US".into(), config.fallback_voice.clone());

        let request = SynthesisRequest::Language("en-US".into());
        assert!(build_speech_request(&config, "t", &request).is_err());
        assert!(build_speech_request(&config, "t", &voiceless("en-US")).is_ok());
    }
}
