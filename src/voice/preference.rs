//! Voice preference chosen by the user and its resolution per reply.

use serde::{Deserialize, Serialize};

use super::language::Language;

/// Default voice for French replies in auto mode.
pub const AUTO_FRENCH_VOICE: &str = "Mathieu";

/// Default voice for English replies in auto mode.
pub const AUTO_ENGLISH_VOICE: &str = "Matthew";

/// Voices that always speak French, whatever the reply looks like.
pub const FORCED_FRENCH_VOICES: &[&str] = &["Lea", "Chantal", "Celine"];

/// Voices that get the alternative-name pass when the plain request fails.
pub const ALTERNATIVE_VOICE_TRIGGERS: &[&str] = &["Lea", "Chantal"];

/// Names tried, in order, during the alternative-name pass.
pub const ALTERNATIVE_FRENCH_VOICES: &[&str] = &["Lea", "Chantal", "Celine", "Mathieu"];

/// The user's voice choice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePreference {
    /// Pick a voice from the detected language.
    #[default]
    Auto,
    /// Use this voice name.
    Named(String),
}

impl VoicePreference {
    /// Parse a menu entry: `auto` (any case) or a voice name.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            Self::Auto
        } else {
            Self::Named(value.to_owned())
        }
    }

    /// The explicit voice name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Named(name) => Some(name),
        }
    }

    /// Whether this preference triggers the alternative-name pass.
    pub fn wants_alternatives(&self) -> bool {
        self.name()
            .is_some_and(|name| ALTERNATIVE_VOICE_TRIGGERS.contains(&name))
    }

    /// The voices offered in the menu, with display labels.
    pub fn catalogue() -> Vec<VoiceOption> {
        [
            ("auto", "Auto (Mathieu/Matthew)", false),
            ("Mathieu", "Mathieu (FR)", false),
            ("Matthew", "Matthew (EN)", false),
            ("Joey", "Joey (EN)", false),
            ("Brian", "Brian (EN) - Provocatif", true),
            ("Lea", "Léa (FR) - Provocative", true),
            ("Chantal", "Chantal (FR) - Provocative", true),
            ("Celine", "Céline (FR)", true),
            ("Amy", "Amy (EN) - Provocative", true),
            ("Emma", "Emma (EN) - Provocative", true),
        ]
        .into_iter()
        .map(|(value, label, provocative)| VoiceOption {
            preference: Self::parse(value),
            label,
            provocative,
        })
        .collect()
    }
}

/// One entry of the voice menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceOption {
    /// Preference selected by this entry.
    pub preference: VoicePreference,
    /// Label shown to the user.
    pub label: &'static str,
    /// Listed under the "Voix provocatives" divider.
    pub provocative: bool,
}

/// Voice and language used for one playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSelection {
    /// Voice name sent to the synthesizer.
    pub voice: String,
    /// Language the voice will speak.
    pub language: Language,
}

/// Resolve the preference against the detected language.
///
/// An explicit forced-French voice overrides detection.
pub fn resolve_voice(preference: &VoicePreference, detected: Language) -> VoiceSelection {
    match preference {
        VoicePreference::Auto => VoiceSelection {
            voice: match detected {
                Language::French => AUTO_FRENCH_VOICE,
                Language::English => AUTO_ENGLISH_VOICE,
            }
            .to_owned(),
            language: detected,
        },
        VoicePreference::Named(name) => VoiceSelection {
            voice: name.clone(),
            language: if FORCED_FRENCH_VOICES.contains(&name.as_str()) {
                Language::French
            } else {
                detected
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_picks_per_language_default() {
        let fr = resolve_voice(&VoicePreference::Auto, Language::French);
        assert_eq!(fr.voice, "Mathieu");
        assert_eq!(fr.language, Language::French);

        let en = resolve_voice(&VoicePreference::Auto, Language::English);
        assert_eq!(en.voice, "Matthew");
        assert_eq!(en.language, Language::English);
    }

    #[test]
    fn forced_french_voice_overrides_detection() {
        for name in FORCED_FRENCH_VOICES {
            let sel = resolve_voice(&VoicePreference::Named((*name).to_owned()), Language::English);
            assert_eq!(sel.voice, *name);
            assert_eq!(sel.language, Language::French);
        }
    }

    #[test]
    fn other_named_voice_keeps_detected_language() {
        let sel = resolve_voice(&VoicePreference::parse("Joey"), Language::French);
        assert_eq!(sel.voice, "Joey");
        assert_eq!(sel.language, Language::French);
    }

    #[test]
    fn parse_auto_variants() {
        assert_eq!(VoicePreference::parse("auto"), VoicePreference::Auto);
        assert_eq!(VoicePreference::parse(" AUTO "), VoicePreference::Auto);
        assert_eq!(VoicePreference::parse(""), VoicePreference::Auto);
        assert_eq!(
            VoicePreference::parse("Emma"),
            VoicePreference::Named("Emma".into())
        );
    }

    #[test]
    fn alternatives_only_for_lea_and_chantal() {
        assert!(VoicePreference::parse("Lea").wants_alternatives());
        assert!(VoicePreference::parse("Chantal").wants_alternatives());
        assert!(!VoicePreference::parse("Celine").wants_alternatives());
        assert!(!VoicePreference::Auto.wants_alternatives());
    }

    #[test]
    fn catalogue_starts_with_auto() {
        let voices = VoicePreference::catalogue();
        assert_eq!(voices.len(), 10);
        assert_eq!(voices[0].preference, VoicePreference::Auto);
        assert_eq!(voices.iter().filter(|v| v.provocative).count(), 6);
    }
}
