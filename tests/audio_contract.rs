//! Transcription and speech endpoint contract tests.
//!
//! Transcription: multipart upload fields, `text` extraction, empty and
//! failed results. Speech: JSON body, provider refusal without a request,
//! WAV decoding. No audio device is opened here.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bruti::audio::encode_wav;
use bruti::config::{ApiConfig, SpeechConfig, TranscriptionConfig};
use bruti::error::NO_TRANSCRIPT;
use bruti::llm::persona;
use bruti::stt::{Transcriber, TranscriptionClient};
use bruti::tts::HttpSynthesizer;
use bruti::voice::{SpeechSynthesizer, SynthesisOptions, SynthesisRequest};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: format!("{}/openai/v1", server.uri()),
        api_key: "test-key".into(),
        api_key_env: "BRUTI_TEST_KEY_THAT_IS_NEVER_SET".into(),
    }
}

fn clip() -> Vec<u8> {
    encode_wav(&[0.0, 0.25, -0.25, 0.5], 16_000).unwrap()
}

/// Silence at 4kHz: every header and sample byte is ASCII, so string
/// matchers can inspect the multipart body.
fn ascii_clip() -> Vec<u8> {
    encode_wav(&[0.0; 4], 4_000).unwrap()
}

// ────────────────────────────────────────────────────────────────────────────
// Transcription
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transcription_uploads_clip_with_model_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/audio/transcriptions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_string_contains("name=\"file\"; filename=\"recording.wav\""))
        .and(body_string_contains("whisper-large-v3-turbo"))
        .and(body_string_contains("verbose_json"))
        .and(body_string_contains("RIFF"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": "transcribe",
            "language": "french",
            "duration": 1.2,
            "text": " Pourquoi le ciel est bleu ? "
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TranscriptionClient::new(&api_for(&server), TranscriptionConfig::default()).unwrap();
    let text = client.transcribe(ascii_clip()).await.unwrap();
    assert_eq!(text, "Pourquoi le ciel est bleu ?");
}

#[tokio::test]
async fn transcription_sends_language_hint_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("name=\"language\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "bonjour"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = TranscriptionConfig {
        language: Some("fr".into()),
        ..TranscriptionConfig::default()
    };
    let client = TranscriptionClient::new(&api_for(&server), config).unwrap();
    assert_eq!(client.transcribe(ascii_clip()).await.unwrap(), "bonjour");
}

#[tokio::test]
async fn blank_transcript_is_an_empty_transcript_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "   "})))
        .mount(&server)
        .await;

    let client = TranscriptionClient::new(&api_for(&server), TranscriptionConfig::default()).unwrap();
    let err = client.transcribe(ascii_clip()).await.unwrap_err();
    assert_eq!(err.code(), "TRANSCRIPTION_FAILED");
    assert_eq!(err.message(), NO_TRANSCRIPT);
    assert_eq!(err.user_message(), persona::EMPTY_TRANSCRIPT_NOTICE);
}

#[tokio::test]
async fn failed_transcription_keeps_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "file is too short"}
        })))
        .mount(&server)
        .await;

    let client = TranscriptionClient::new(&api_for(&server), TranscriptionConfig::default()).unwrap();
    let err = client.transcribe(ascii_clip()).await.unwrap_err();
    assert_eq!(err.code(), "TRANSCRIPTION_FAILED");
    assert_eq!(err.message(), "file is too short");
    assert_eq!(err.user_message(), persona::TRANSCRIPTION_FAILED_NOTICE);
}

// ────────────────────────────────────────────────────────────────────────────
// Speech
// ────────────────────────────────────────────────────────────────────────────

fn named(voice: &str, provider: Option<&str>) -> SynthesisRequest {
    SynthesisRequest::Options(SynthesisOptions {
        provider: provider.map(str::to_owned),
        voice: Some(voice.to_owned()),
        language: "fr-FR".into(),
        engine: Some("neural".into()),
    })
}

#[tokio::test]
async fn speech_request_is_decoded_into_a_clip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/audio/speech"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "playai-tts",
            "input": "Salut",
            "voice": "Celeste-PlayAI",
            "response_format": "wav"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/wav")
                .set_body_bytes(clip()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let synth = HttpSynthesizer::new(&api_for(&server), SpeechConfig::default(), None).unwrap();
    let clip = synth
        .fetch_clip("Salut", &named("Celeste-PlayAI", None))
        .await
        .unwrap();
    assert_eq!(clip.sample_rate, 16_000);
    assert_eq!(clip.samples.len(), 4);
}

#[tokio::test]
async fn other_provider_is_refused_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(clip()))
        .expect(0)
        .mount(&server)
        .await;

    let synth = HttpSynthesizer::new(&api_for(&server), SpeechConfig::default(), None).unwrap();
    let err = synth
        .synthesize("Salut", &named("Lea", Some("aws-polly")))
        .await
        .err()
        .unwrap();
    assert_eq!(err.code(), "PLAYBACK_FAILED");
}

#[tokio::test]
async fn unknown_voice_is_a_playback_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "voice must be one of [...]"}
        })))
        .mount(&server)
        .await;

    let synth = HttpSynthesizer::new(&api_for(&server), SpeechConfig::default(), None).unwrap();
    let err = synth
        .synthesize("Hello", &named("Matthew", None))
        .await
        .err()
        .unwrap();
    assert_eq!(err.code(), "PLAYBACK_FAILED");
    assert!(err.message().starts_with("voice must be"));
}

#[tokio::test]
async fn bare_language_request_uses_fallback_voice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"voice": "Fritz-PlayAI"})))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(clip()))
        .expect(1)
        .mount(&server)
        .await;

    let synth = HttpSynthesizer::new(&api_for(&server), SpeechConfig::default(), None).unwrap();
    // The handle is not played; no device is opened.
    assert!(
        synth
            .synthesize("Hello", &SynthesisRequest::Language("en-US".into()))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn voiceless_french_request_uses_the_french_voice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"voice": "Celeste-PlayAI"})))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(clip()))
        .expect(1)
        .mount(&server)
        .await;

    let synth = HttpSynthesizer::new(&api_for(&server), SpeechConfig::default(), None).unwrap();
    let request = SynthesisRequest::Options(SynthesisOptions {
        language: "fr-FR".into(),
        engine: Some("neural".into()),
        ..SynthesisOptions::default()
    });
    let clip = synth.fetch_clip("Salut", &request).await.unwrap();
    assert_eq!(clip.samples.len(), 4);
}
