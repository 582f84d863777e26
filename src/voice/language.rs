//! Lexical language detection for spoken replies.
//!
//! Only two languages matter: French and English. A reply is French when it
//! contains an accented French letter or one of a couple of very common
//! French words; anything else is English.

use serde::{Deserialize, Serialize};

/// Accented letters that mark French text.
const FRENCH_LETTERS: &[char] = &[
    'à', 'â', 'ä', 'é', 'è', 'ê', 'ë', 'ï', 'î', 'ô', 'ù', 'û', 'ü', 'ÿ', 'ç',
];

/// Substrings that mark French text (matched case-insensitively).
const FRENCH_MARKERS: &[&str] = &["c'est", "dans"];

/// Spoken language of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    /// `fr-FR`.
    French,
    /// `en-US`.
    English,
}

impl Language {
    /// BCP 47 tag sent to the synthesizer.
    pub fn tag(self) -> &'static str {
        match self {
            Self::French => "fr-FR",
            Self::English => "en-US",
        }
    }
}

/// Classify `text` as French or English.
pub fn detect_language(text: &str) -> Language {
    if text.contains(FRENCH_LETTERS) {
        return Language::French;
    }
    let lower = text.to_lowercase();
    if FRENCH_MARKERS.iter().any(|m| lower.contains(m)) {
        Language::French
    } else {
        Language::English
    }
}
