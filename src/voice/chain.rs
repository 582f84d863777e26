//! Synthesis request shapes and the ordered fallback chain.
//!
//! Synthesis backends disagree about which option combinations they accept,
//! so a reply is attempted with a fixed list of request shapes, most specific
//! first. The list is data: [`synthesis_chain`] builds it and the selector
//! walks it.

use std::sync::Arc;

use async_trait::async_trait;

use super::language::Language;
use super::preference::{ALTERNATIVE_FRENCH_VOICES, VoicePreference, VoiceSelection};
use crate::error::Result;

/// Provider requested by the first chain step.
pub const PREFERRED_PROVIDER: &str = "aws-polly";

/// Engine requested by the provider-less steps.
pub const NEURAL_ENGINE: &str = "neural";

/// Structured synthesis options. Absent fields are left to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SynthesisOptions {
    /// Synthesis provider.
    pub provider: Option<String>,
    /// Voice name.
    pub voice: Option<String>,
    /// BCP 47 language tag.
    pub language: String,
    /// Engine variant.
    pub engine: Option<String>,
}

/// One attempt in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisRequest {
    /// Structured options.
    Options(SynthesisOptions),
    /// Bare language tag, the last resort.
    Language(String),
}

impl SynthesisRequest {
    /// The voice requested, if any.
    pub fn voice(&self) -> Option<&str> {
        match self {
            Self::Options(options) => options.voice.as_deref(),
            Self::Language(_) => None,
        }
    }

    /// The language tag requested.
    pub fn language(&self) -> &str {
        match self {
            Self::Options(options) => &options.language,
            Self::Language(tag) => tag,
        }
    }

    /// The provider requested, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Options(options) => options.provider.as_deref(),
            Self::Language(_) => None,
        }
    }
}

/// Build the ordered list of synthesis attempts.
///
/// `detected` is the language found in the text; `selection` may differ when
/// the chosen voice forces French.
pub fn synthesis_chain(
    preference: &VoicePreference,
    selection: &VoiceSelection,
    detected: Language,
) -> Vec<SynthesisRequest> {
    let language = selection.language.tag().to_owned();
    let mut chain = vec![
        SynthesisRequest::Options(SynthesisOptions {
            provider: Some(PREFERRED_PROVIDER.to_owned()),
            voice: Some(selection.voice.clone()),
            language: language.clone(),
            engine: None,
        }),
        SynthesisRequest::Options(SynthesisOptions {
            provider: None,
            voice: Some(selection.voice.clone()),
            language: language.clone(),
            engine: Some(NEURAL_ENGINE.to_owned()),
        }),
    ];

    if preference.wants_alternatives() && detected == Language::French {
        chain.extend(ALTERNATIVE_FRENCH_VOICES.iter().map(|voice| {
            SynthesisRequest::Options(SynthesisOptions {
                provider: None,
                voice: Some((*voice).to_owned()),
                language: Language::French.tag().to_owned(),
                engine: Some(NEURAL_ENGINE.to_owned()),
            })
        }));
    }

    chain.push(SynthesisRequest::Options(SynthesisOptions {
        provider: None,
        voice: None,
        language: language.clone(),
        engine: Some(NEURAL_ENGINE.to_owned()),
    }));
    chain.push(SynthesisRequest::Language(language));
    chain
}

/// A playable clip produced by a synthesizer.
#[async_trait]
pub trait AudioHandle: Send + Sync {
    /// Start playback. Returns once audio is playing.
    async fn play(&self) -> Result<()>;

    /// Resolve when playback is over: `Ok` on natural end, `Err` on a
    /// playback error.
    async fn finished(&self) -> Result<()>;

    /// Stop playback and release the output device. Idempotent.
    fn stop(&self);
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Synthesize `text` with `request`. Fails if the backend cannot honour
    /// this request shape.
    async fn synthesize(&self, text: &str, request: &SynthesisRequest)
    -> Result<Arc<dyn AudioHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::preference::resolve_voice;

    fn chain_for(preference: &str, detected: Language) -> Vec<SynthesisRequest> {
        let preference = VoicePreference::parse(preference);
        let selection = resolve_voice(&preference, detected);
        synthesis_chain(&preference, &selection, detected)
    }

    #[test]
    fn auto_chain_has_four_steps_in_order() {
        let chain = chain_for("auto", Language::English);
        assert_eq!(chain.len(), 4);

        assert_eq!(chain[0].provider(), Some(PREFERRED_PROVIDER));
        assert_eq!(chain[0].voice(), Some("Matthew"));
        assert_eq!(chain[0].language(), "en-US");

        assert_eq!(chain[1].provider(), None);
        assert_eq!(chain[1].voice(), Some("Matthew"));

        assert_eq!(chain[2].voice(), None);
        assert!(matches!(chain[2], SynthesisRequest::Options(_)));

        assert_eq!(chain[3], SynthesisRequest::Language("en-US".into()));
    }

    #[test]
    fn lea_in_french_reply_adds_alternatives() {
        let chain = chain_for("Lea", Language::French);
        assert_eq!(chain.len(), 8);
        let alternatives: Vec<&str> = chain[2..6].iter().filter_map(|r| r.voice()).collect();
        assert_eq!(alternatives, ALTERNATIVE_FRENCH_VOICES);
        assert!(chain[2..6].iter().all(|r| r.language() == "fr-FR"));
    }

    #[test]
    fn lea_in_english_reply_skips_alternatives_but_speaks_french() {
        let chain = chain_for("Lea", Language::English);
        assert_eq!(chain.len(), 4);
        assert!(chain.iter().all(|r| r.language() == "fr-FR"));
    }

    #[test]
    fn celine_never_gets_alternatives() {
        assert_eq!(chain_for("Celine", Language::French).len(), 4);
    }
}
