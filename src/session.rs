//! The chat session: one conversation, one completion client, one voice
//! selector, one capture slot.
//!
//! Front ends drive the session through `send`, the voice toggles and
//! `toggle_recording`, and render from [`SessionEvent`]s.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::audio::CpalCapture;
use crate::capture::{CaptureBridge, CaptureOutcome};
use crate::config::ChatConfig;
use crate::conversation::{ConversationStore, Message, MessageId};
use crate::error::{ChatError, Result};
use crate::llm::{CompletionClient, ReplyChunk, persona};
use crate::runtime::{Notice, SessionEvent};
use crate::stt::TranscriptionClient;
use crate::tts::HttpSynthesizer;
use crate::voice::{VoicePlaybackSelector, VoicePreference};

/// Capacity of the event channel. Slow subscribers lose the oldest events.
const EVENT_CAPACITY: usize = 256;

/// How a send ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    /// The model replied (possibly with a fallback line).
    Replied(String),
    /// The request failed and the apology was shown instead.
    Apologized(ChatError),
}

/// Result of [`ChatSession::toggle_recording`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingOutcome {
    /// The microphone is now open.
    Started,
    /// The transcript was sent as a message.
    Sent {
        /// What the user said.
        transcript: String,
        /// How the send ended.
        outcome: SendOutcome,
    },
}

/// A running conversation with Chat'Bruti.
pub struct ChatSession {
    store: ConversationStore,
    client: CompletionClient,
    voice: VoicePlaybackSelector,
    capture: Option<CaptureBridge>,
    voice_enabled: bool,
    preference: VoicePreference,
    events: broadcast::Sender<SessionEvent>,
    playback_forwarder: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("messages", &self.store.len())
            .field("voice_enabled", &self.voice_enabled)
            .field("preference", &self.preference)
            .field("capture", &self.capture)
            .finish()
    }
}

impl ChatSession {
    /// Create a session. The conversation opens with the greeting.
    ///
    /// Must be called inside a Tokio runtime: playback state changes are
    /// forwarded to subscribers by a background task.
    pub fn new(
        client: CompletionClient,
        voice: VoicePlaybackSelector,
        capture: Option<CaptureBridge>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let mut playback_rx = voice.subscribe();
        let forward_tx = events.clone();
        let playback_forwarder = tokio::spawn(async move {
            while playback_rx.changed().await.is_ok() {
                let state = *playback_rx.borrow_and_update();
                let _ = forward_tx.send(SessionEvent::Playback(state));
            }
        });

        Self {
            store: ConversationStore::with_greeting(),
            client,
            voice,
            capture,
            voice_enabled: false,
            preference: VoicePreference::Auto,
            events,
            playback_forwarder: Some(playback_forwarder),
            shut_down: false,
        }
    }

    /// Wire the HTTP completion, speech and transcription clients with cpal
    /// playback and capture.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no API key is configured.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let client = CompletionClient::from_config(config)?;
        let synthesizer = HttpSynthesizer::from_config(config)?;
        let transcriber = TranscriptionClient::from_config(config)?;
        let capture = CaptureBridge::new(
            Arc::new(CpalCapture::new(&config.audio)),
            Arc::new(transcriber),
        );
        Ok(Self::new(
            client,
            VoicePlaybackSelector::new(Arc::new(synthesizer)),
            Some(capture),
        ))
    }

    /// The conversation so far.
    pub fn conversation(&self) -> &[Message] {
        self.store.messages()
    }

    /// Receive session events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Whether replies are spoken.
    pub fn voice_mode(&self) -> bool {
        self.voice_enabled
    }

    /// The selected voice.
    pub fn voice_preference(&self) -> &VoicePreference {
        &self.preference
    }

    /// Send a user message and stream the reply into the conversation.
    ///
    /// Transport and provider failures do not surface as errors: the reply
    /// is finalized with the apology and [`SendOutcome::Apologized`] carries
    /// the cause.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Busy`] if a reply is still streaming.
    pub async fn send(&mut self, text: &str) -> Result<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }
        if let Some(streaming) = self.store.streaming_message() {
            warn!(id = ?streaming.id, "send refused, reply still streaming");
            return Err(ChatError::Busy("a reply is still streaming".into()));
        }

        let user = Message::user(text);
        self.store.append(user.clone())?;
        self.emit(SessionEvent::MessageAppended(user));

        let id = MessageId::new();
        self.store.append_streaming_placeholder(id)?;
        if let Some(placeholder) = self.store.get(id) {
            self.emit(SessionEvent::MessageAppended(placeholder.clone()));
        }

        let outcome = {
            let mut pending = PendingReply {
                store: &mut self.store,
                events: &self.events,
                id,
            };
            match stream_into(&self.client, &mut pending, text).await {
                Ok(replacement) => SendOutcome::Replied(pending.finish(replacement)),
                Err(e) => {
                    error!(error = %e, "completion failed");
                    pending.finish(Some(&e.user_message()));
                    SendOutcome::Apologized(e)
                }
            }
        };

        if let SendOutcome::Replied(reply) = &outcome
            && self.voice_enabled
        {
            self.speak(reply).await;
        }
        Ok(outcome)
    }

    /// Switch spoken replies on or off. Any playing audio stops.
    pub fn set_voice_mode(&mut self, enabled: bool) {
        self.voice.stop();
        if self.voice_enabled != enabled {
            self.voice_enabled = enabled;
            info!(enabled, "voice mode changed");
            self.emit(SessionEvent::VoiceMode { enabled });
        }
    }

    /// Flip voice mode and return the new value. Any playing audio stops.
    pub fn toggle_voice_mode(&mut self) -> bool {
        self.set_voice_mode(!self.voice_enabled);
        self.voice_enabled
    }

    /// Choose the voice for later replies.
    pub fn set_voice_preference(&mut self, preference: VoicePreference) {
        info!(?preference, "voice preference changed");
        self.preference = preference;
    }

    /// Start recording, or stop and send the transcript.
    ///
    /// Capture and transcription failures are also reported as a
    /// [`SessionEvent::Notice`]; they never touch the conversation.
    ///
    /// # Errors
    ///
    /// [`ChatError::PermissionDenied`] when the microphone is refused (no
    /// transcription is attempted), [`ChatError::Capture`] when no capture
    /// device is wired or it fails, [`ChatError::Transcription`] when no
    /// usable text came back, [`ChatError::Busy`] as for [`ChatSession::send`].
    pub async fn toggle_recording(&mut self) -> Result<RecordingOutcome> {
        let Some(capture) = self.capture.as_mut() else {
            let e = ChatError::Capture("no capture device configured".into());
            self.emit(SessionEvent::Notice(Notice::for_error(&e)));
            return Err(e);
        };

        let result = capture.toggle().await;
        let state = capture.state();
        self.emit(SessionEvent::Recording(state));

        match result {
            Ok(CaptureOutcome::Started) => Ok(RecordingOutcome::Started),
            Ok(CaptureOutcome::Transcribed(transcript)) => {
                let outcome = self.send(&transcript).await?;
                Ok(RecordingOutcome::Sent {
                    transcript,
                    outcome,
                })
            }
            Err(e) => {
                self.emit(SessionEvent::Notice(Notice::for_error(&e)));
                Err(e)
            }
        }
    }

    /// Stop playing audio and release the microphone. Synchronous and
    /// idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.voice.stop();
        if let Some(capture) = self.capture.as_mut() {
            capture.cancel();
        }
        if let Some(forwarder) = self.playback_forwarder.take() {
            forwarder.abort();
        }
        info!("session shut down");
    }

    async fn speak(&mut self, reply: &str) {
        let preference = self.preference.clone();
        if let Err(e) = self.voice.play(reply, &preference).await {
            warn!(error = %e, "reply not spoken");
            self.emit(SessionEvent::Notice(Notice::for_error(&e)));
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// The bot message being streamed by one `send`.
///
/// Dropped before [`PendingReply::finish`] (the `send` future was
/// abandoned), it finalizes the message with the apology so the
/// conversation never keeps a dangling streaming message.
struct PendingReply<'a> {
    store: &'a mut ConversationStore,
    events: &'a broadcast::Sender<SessionEvent>,
    id: MessageId,
}

impl PendingReply<'_> {
    fn push(&mut self, fragment: String) {
        self.store.mutate(self.id, &fragment);
        let _ = self.events.send(SessionEvent::MessageUpdated {
            id: self.id,
            fragment,
        });
    }

    /// Freeze the message, optionally replacing what streamed, and return
    /// its final text.
    fn finish(&mut self, replacement: Option<&str>) -> String {
        if !self.store.finalize(self.id, replacement) {
            return String::new();
        }
        let Some(message) = self.store.get(self.id) else {
            return String::new();
        };
        let content = message.content.clone();
        let _ = self.events.send(SessionEvent::MessageFinalized(message.clone()));
        content
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        if self.store.get(self.id).is_some_and(|m| m.is_streaming) {
            warn!(id = %self.id, "reply abandoned mid-stream");
            self.finish(Some(persona::APOLOGY_REPLY));
        }
    }
}

/// Stream the reply into `pending`. Returns the fallback line that should
/// replace the streamed text, if the reply came back empty.
async fn stream_into(
    client: &CompletionClient,
    pending: &mut PendingReply<'_>,
    text: &str,
) -> Result<Option<&'static str>> {
    let mut stream = client.stream_reply(text).await?;
    let mut replacement = None;

    while let Some(chunk) = stream.next().await {
        match chunk? {
            ReplyChunk::Text(fragment) => pending.push(fragment.text),
            ReplyChunk::Fallback(line) => replacement = Some(line),
        }
    }
    Ok(replacement)
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
