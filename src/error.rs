//! Error types for the chat client.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`ChatError::code()`].

use crate::llm::persona;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid or missing configuration (including a missing API key).
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Authentication failed (invalid API key).
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// The HTTP request could not be sent or was rate limited.
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// Reading the streaming response body failed.
    pub const STREAM_FAILED: &str = "STREAM_FAILED";

    /// The provider answered with a non-success status.
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";

    /// No synthesis configuration produced playable audio.
    pub const PLAYBACK_FAILED: &str = "PLAYBACK_FAILED";

    /// Microphone access was refused by the user or the OS.
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";

    /// The capture device is missing or failed.
    pub const CAPTURE_FAILED: &str = "CAPTURE_FAILED";

    /// Transcription failed or returned no usable text.
    pub const TRANSCRIPTION_FAILED: &str = "TRANSCRIPTION_FAILED";

    /// A completion is already in flight for this session.
    pub const SESSION_BUSY: &str = "SESSION_BUSY";
}

/// Message carried by [`ChatError::Transcription`] when nothing usable came
/// back from the microphone or the transcription endpoint.
pub const NO_TRANSCRIPT: &str = "no transcription received";

/// Errors produced by the chat client.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// Authentication failed.
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    Auth(String),

    /// Request could not be sent, or was rate limited.
    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    Request(String),

    /// Streaming response encountered an error.
    #[error("[{}] {}", error_codes::STREAM_FAILED, .0)]
    Stream(String),

    /// Non-success HTTP status from the provider.
    #[error("[{}] {}", error_codes::PROVIDER_ERROR, .0)]
    Provider(String),

    /// Every synthesis configuration failed, or playback could not start.
    #[error("[{}] {}", error_codes::PLAYBACK_FAILED, .0)]
    Playback(String),

    /// Microphone permission denied.
    #[error("[{}] {}", error_codes::PERMISSION_DENIED, .0)]
    PermissionDenied(String),

    /// Capture device unavailable or failed mid-recording.
    #[error("[{}] {}", error_codes::CAPTURE_FAILED, .0)]
    Capture(String),

    /// Transcription request failed or came back empty.
    #[error("[{}] {}", error_codes::TRANSCRIPTION_FAILED, .0)]
    Transcription(String),

    /// A send was attempted while a reply is still streaming.
    #[error("[{}] {}", error_codes::SESSION_BUSY, .0)]
    Busy(String),
}

impl ChatError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Auth(_) => error_codes::AUTH_FAILED,
            Self::Request(_) => error_codes::REQUEST_FAILED,
            Self::Stream(_) => error_codes::STREAM_FAILED,
            Self::Provider(_) => error_codes::PROVIDER_ERROR,
            Self::Playback(_) => error_codes::PLAYBACK_FAILED,
            Self::PermissionDenied(_) => error_codes::PERMISSION_DENIED,
            Self::Capture(_) => error_codes::CAPTURE_FAILED,
            Self::Transcription(_) => error_codes::TRANSCRIPTION_FAILED,
            Self::Busy(_) => error_codes::SESSION_BUSY,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Auth(m)
            | Self::Request(m)
            | Self::Stream(m)
            | Self::Provider(m)
            | Self::Playback(m)
            | Self::PermissionDenied(m)
            | Self::Capture(m)
            | Self::Transcription(m)
            | Self::Busy(m) => m,
        }
    }

    /// Returns true if this error represents a transient failure.
    ///
    /// Configuration, auth and permission problems need user action first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Auth(_) | Self::PermissionDenied(_) => false,
            Self::Request(_) | Self::Stream(_) | Self::Provider(_) => true,
            Self::Playback(_) | Self::Capture(_) | Self::Transcription(_) => true,
            Self::Busy(_) => true,
        }
    }

    /// Whether the user can fix this by granting microphone access.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_)
            | Self::Auth(_)
            | Self::Request(_)
            | Self::Stream(_)
            | Self::Provider(_)
            | Self::Busy(_) => persona::APOLOGY_REPLY.to_owned(),
            Self::Playback(m) => format!("{}{m}", persona::PLAYBACK_ERROR_PREFIX),
            Self::PermissionDenied(_) => persona::PERMISSION_DENIED_NOTICE.to_owned(),
            Self::Capture(_) => persona::CAPTURE_START_NOTICE.to_owned(),
            Self::Transcription(m) if m == NO_TRANSCRIPT => {
                persona::EMPTY_TRANSCRIPT_NOTICE.to_owned()
            }
            Self::Transcription(_) => persona::TRANSCRIPTION_FAILED_NOTICE.to_owned(),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Self::Request(format!("HTTP request failed: {e}"))
        } else if e.is_body() || e.is_decode() {
            Self::Stream(format!("response body error: {e}"))
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = ChatError::Config("GROQ_API_KEY is not set".into());
        assert_eq!(err.to_string(), "[CONFIG_INVALID] GROQ_API_KEY is not set");
    }

    #[test]
    fn message_strips_code() {
        let err = ChatError::Provider("HTTP 500".into());
        assert_eq!(err.message(), "HTTP 500");
        assert_eq!(err.code(), "PROVIDER_ERROR");
    }

    #[test]
    fn codes_are_distinct() {
        let errors = [
            ChatError::Config(String::new()),
            ChatError::Auth(String::new()),
            ChatError::Request(String::new()),
            ChatError::Stream(String::new()),
            ChatError::Provider(String::new()),
            ChatError::Playback(String::new()),
            ChatError::PermissionDenied(String::new()),
            ChatError::Capture(String::new()),
            ChatError::Transcription(String::new()),
            ChatError::Busy(String::new()),
        ];
        let mut codes: Vec<&str> = errors.iter().map(ChatError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn permission_denied_is_distinct_and_not_retryable() {
        let denied = ChatError::PermissionDenied("NotAllowedError".into());
        let other = ChatError::Capture("no default input device".into());
        assert!(denied.is_permission_denied());
        assert!(!other.is_permission_denied());
        assert!(!denied.is_retryable());
        assert_ne!(denied.user_message(), other.user_message());
    }

    #[test]
    fn transport_errors_render_apology() {
        let err = ChatError::Stream("read error".into());
        assert_eq!(err.user_message(), persona::APOLOGY_REPLY);
    }

    #[test]
    fn playback_user_message_carries_detail() {
        let err = ChatError::Playback("Failed to generate audio".into());
        assert!(err.user_message().ends_with("Failed to generate audio"));
    }

    #[test]
    fn empty_transcript_has_its_own_notice() {
        let empty = ChatError::Transcription(NO_TRANSCRIPT.into());
        assert_eq!(empty.user_message(), persona::EMPTY_TRANSCRIPT_NOTICE);
        let failed = ChatError::Transcription("HTTP error! status: 500".into());
        assert_eq!(failed.user_message(), persona::TRANSCRIPTION_FAILED_NOTICE);
    }
}
