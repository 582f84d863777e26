//! Voice playback: language detection, voice resolution, the synthesis
//! fallback chain and the exclusive "currently playing" slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::chain::{AudioHandle, SpeechSynthesizer, SynthesisRequest, synthesis_chain};
use super::language::detect_language;
use super::preference::{VoicePreference, resolve_voice};
use crate::error::{ChatError, Result};

/// Whether a reply is being spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing playing.
    #[default]
    Idle,
    /// A clip is playing.
    Playing,
}

/// What a successful [`VoicePlaybackSelector::play`] used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStarted {
    /// Zero-based index of the chain step that succeeded.
    pub step: usize,
    /// The request shape that succeeded.
    pub request: SynthesisRequest,
}

struct CurrentPlayback {
    handle: Arc<dyn AudioHandle>,
    watcher: JoinHandle<()>,
}

/// Speaks replies, one at a time.
pub struct VoicePlaybackSelector {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    current: Option<CurrentPlayback>,
    state_tx: watch::Sender<PlaybackState>,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for VoicePlaybackSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePlaybackSelector")
            .field("synthesizer", &self.synthesizer.name())
            .field("state", &*self.state_tx.borrow())
            .finish()
    }
}

impl VoicePlaybackSelector {
    /// Create a selector backed by `synthesizer`.
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            synthesizer,
            current: None,
            state_tx,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        *self.state_tx.borrow()
    }

    /// Watch playback state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Speak `text` with the voice chosen by `preference`.
    ///
    /// Stops whatever is playing first, then walks the synthesis chain until
    /// one request succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Playback`] if every request fails or the clip
    /// cannot start.
    pub async fn play(
        &mut self,
        text: &str,
        preference: &VoicePreference,
    ) -> Result<PlaybackStarted> {
        self.stop();

        let detected = detect_language(text);
        let selection = resolve_voice(preference, detected);
        info!(
            voice = %selection.voice,
            language = selection.language.tag(),
            "playing reply"
        );

        let chain = synthesis_chain(preference, &selection, detected);
        let Some((step, request, handle)) = self.first_success(text, chain).await else {
            return Err(ChatError::Playback("Failed to generate audio".into()));
        };

        self.state_tx.send_replace(PlaybackState::Playing);
        if let Err(e) = handle.play().await {
            warn!(error = %e, "audio playback failed to start");
            handle.stop();
            self.state_tx.send_replace(PlaybackState::Idle);
            return Err(ChatError::Playback(e.message().to_owned()));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let watcher = tokio::spawn(watch_until_finished(
            Arc::clone(&handle),
            self.state_tx.clone(),
            Arc::clone(&self.generation),
            generation,
        ));
        self.current = Some(CurrentPlayback { handle, watcher });

        info!(step, "audio started playing");
        Ok(PlaybackStarted { step, request })
    }

    /// Stop and release the current clip, if any. Synchronous.
    pub fn stop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(current) = self.current.take() {
            current.watcher.abort();
            current.handle.stop();
            debug!("stopped previous audio");
        }
        self.state_tx.send_replace(PlaybackState::Idle);
    }

    async fn first_success(
        &self,
        text: &str,
        chain: Vec<SynthesisRequest>,
    ) -> Option<(usize, SynthesisRequest, Arc<dyn AudioHandle>)> {
        for (step, request) in chain.into_iter().enumerate() {
            match self.synthesizer.synthesize(text, &request).await {
                Ok(handle) => {
                    info!(
                        step,
                        voice = request.voice().unwrap_or("<default>"),
                        language = request.language(),
                        "audio generated"
                    );
                    return Some((step, request, handle));
                }
                Err(e) => {
                    warn!(step, error = %e, "synthesis attempt failed, trying next");
                }
            }
        }
        None
    }
}

impl Drop for VoicePlaybackSelector {
    fn drop(&mut self) {
        if let Some(current) = self.current.take() {
            current.watcher.abort();
            current.handle.stop();
        }
    }
}

/// Return to idle once the clip ends, unless a newer clip has taken over.
async fn watch_until_finished(
    handle: Arc<dyn AudioHandle>,
    state_tx: watch::Sender<PlaybackState>,
    generation: Arc<AtomicU64>,
    mine: u64,
) {
    match handle.finished().await {
        Ok(()) => info!("audio playback ended"),
        Err(e) => warn!(error = %e, "audio playback error"),
    }
    if generation.load(Ordering::SeqCst) == mine {
        state_tx.send_replace(PlaybackState::Idle);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    struct FakeHandle {
        stopped: AtomicBool,
        end: Notify,
        fail_on_end: bool,
    }

    impl FakeHandle {
        fn new(fail_on_end: bool) -> Arc<Self> {
            Arc::new(Self {
                stopped: AtomicBool::new(false),
                end: Notify::new(),
                fail_on_end,
            })
        }
    }

    #[async_trait]
    impl AudioHandle for FakeHandle {
        async fn play(&self) -> Result<()> {
            Ok(())
        }

        async fn finished(&self) -> Result<()> {
            self.end.notified().await;
            if self.fail_on_end {
                Err(ChatError::Playback("decode error".into()))
            } else {
                Ok(())
            }
        }

        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    /// Fails the first `failures` requests, then hands out `handles` in order.
    struct ScriptedSynthesizer {
        failures: usize,
        seen: Mutex<Vec<SynthesisRequest>>,
        handles: Mutex<Vec<Arc<FakeHandle>>>,
    }

    impl ScriptedSynthesizer {
        fn new(failures: usize, handles: Vec<Arc<FakeHandle>>) -> Arc<Self> {
            Arc::new(Self {
                failures,
                seen: Mutex::new(Vec::new()),
                handles: Mutex::new(handles),
            })
        }

        fn seen(&self) -> Vec<SynthesisRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for ScriptedSynthesizer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn synthesize(
            &self,
            _text: &str,
            request: &SynthesisRequest,
        ) -> Result<Arc<dyn AudioHandle>> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(request.clone());
            if seen.len() <= self.failures {
                return Err(ChatError::Playback("voice not available".into()));
            }
            let handle = self.handles.lock().unwrap().remove(0);
            Ok(handle as Arc<dyn AudioHandle>)
        }
    }

    async fn wait_for(rx: &mut watch::Receiver<PlaybackState>, want: PlaybackState) {
        tokio::time::timeout(std::time::Duration::from_secs(2), rx.wait_for(|s| *s == want))
            .await
            .expect("state change in time")
            .expect("sender alive");
    }

    #[tokio::test]
    async fn first_step_success_uses_preferred_provider() {
        let synth = ScriptedSynthesizer::new(0, vec![FakeHandle::new(false)]);
        let mut selector = VoicePlaybackSelector::new(synth.clone());

        let started = selector.play("Hello there", &VoicePreference::Auto).await.unwrap();
        assert_eq!(started.step, 0);
        assert_eq!(started.request.provider(), Some("aws-polly"));
        assert_eq!(started.request.voice(), Some("Matthew"));
        assert_eq!(synth.seen().len(), 1);
        assert_eq!(selector.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn chain_stops_at_first_success() {
        let synth = ScriptedSynthesizer::new(2, vec![FakeHandle::new(false)]);
        let mut selector = VoicePlaybackSelector::new(synth.clone());

        let started = selector
            .play("C'est la vie", &VoicePreference::Auto)
            .await
            .unwrap();
        assert_eq!(started.step, 2);
        assert_eq!(started.request.voice(), None);
        assert_eq!(started.request.language(), "fr-FR");
        assert_eq!(synth.seen().len(), 3);
    }

    #[tokio::test]
    async fn alternative_voice_used_when_named_voice_fails() {
        let synth = ScriptedSynthesizer::new(3, vec![FakeHandle::new(false)]);
        let mut selector = VoicePlaybackSelector::new(synth.clone());

        let started = selector
            .play("Un poisson à vélo", &VoicePreference::parse("Chantal"))
            .await
            .unwrap();
        // Steps: polly, neural, alt Lea (fail), alt Chantal (ok).
        assert_eq!(started.step, 3);
        assert_eq!(started.request.voice(), Some("Chantal"));
        assert_eq!(synth.seen().len(), 4);
    }

    #[tokio::test]
    async fn exhausted_chain_is_playback_error() {
        let synth = ScriptedSynthesizer::new(usize::MAX, Vec::new());
        let mut selector = VoicePlaybackSelector::new(synth.clone());

        let err = selector.play("Hello", &VoicePreference::Auto).await.unwrap_err();
        assert_eq!(err.code(), "PLAYBACK_FAILED");
        assert_eq!(synth.seen().len(), 4);
        assert_eq!(selector.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn new_playback_stops_previous_handle() {
        let first = FakeHandle::new(false);
        let second = FakeHandle::new(false);
        let synth = ScriptedSynthesizer::new(0, vec![first.clone(), second.clone()]);
        let mut selector = VoicePlaybackSelector::new(synth);

        selector.play("one", &VoicePreference::Auto).await.unwrap();
        assert!(!first.stopped.load(Ordering::SeqCst));
        selector.play("two", &VoicePreference::Auto).await.unwrap();
        assert!(first.stopped.load(Ordering::SeqCst));
        assert!(!second.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn natural_end_returns_to_idle() {
        let handle = FakeHandle::new(false);
        let synth = ScriptedSynthesizer::new(0, vec![handle.clone()]);
        let mut selector = VoicePlaybackSelector::new(synth);
        let mut rx = selector.subscribe();

        selector.play("Hello", &VoicePreference::Auto).await.unwrap();
        assert_eq!(*rx.borrow_and_update(), PlaybackState::Playing);
        handle.end.notify_one();
        wait_for(&mut rx, PlaybackState::Idle).await;
    }

    #[tokio::test]
    async fn playback_error_returns_to_idle() {
        let handle = FakeHandle::new(true);
        let synth = ScriptedSynthesizer::new(0, vec![handle.clone()]);
        let mut selector = VoicePlaybackSelector::new(synth);
        let mut rx = selector.subscribe();

        selector.play("Hello", &VoicePreference::Auto).await.unwrap();
        handle.end.notify_one();
        wait_for(&mut rx, PlaybackState::Idle).await;
    }

    #[tokio::test]
    async fn stop_is_synchronous_and_idempotent() {
        let handle = FakeHandle::new(false);
        let synth = ScriptedSynthesizer::new(0, vec![handle.clone()]);
        let mut selector = VoicePlaybackSelector::new(synth);

        selector.play("Hello", &VoicePreference::Auto).await.unwrap();
        selector.stop();
        assert!(handle.stopped.load(Ordering::SeqCst));
        assert_eq!(selector.state(), PlaybackState::Idle);
        selector.stop();
        assert_eq!(selector.state(), PlaybackState::Idle);
    }
}
