//! Session events emitted for front ends.
//!
//! Payloads are small clones so the session can emit while a reply streams
//! without waiting on the consumer.

use std::time::Duration;

use crate::capture::RecordingState;
use crate::conversation::{Message, MessageId};
use crate::error::{ChatError, NO_TRANSCRIPT};
use crate::voice::PlaybackState;

/// Dismissal delay for an empty transcript or a recording that would not start.
pub const SHORT_NOTICE: Duration = Duration::from_secs(3);

/// Dismissal delay for a failed transcription or playback.
pub const LONG_NOTICE: Duration = Duration::from_secs(5);

/// How a notice should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The user has to act (grant microphone access). Stays until dismissed.
    PermissionPrompt,
    /// Informational; the front end hides it after `dismiss_after`.
    Transient {
        /// Display time.
        dismiss_after: Duration,
    },
}

/// A message shown outside the conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// French text for the user.
    pub text: String,
    /// Presentation.
    pub kind: NoticeKind,
}

impl Notice {
    /// The notice for a capture, transcription or playback failure.
    pub fn for_error(error: &ChatError) -> Self {
        let kind = match error {
            ChatError::PermissionDenied(_) => NoticeKind::PermissionPrompt,
            ChatError::Transcription(m) if m == NO_TRANSCRIPT => NoticeKind::Transient {
                dismiss_after: SHORT_NOTICE,
            },
            ChatError::Capture(_) | ChatError::Busy(_) => NoticeKind::Transient {
                dismiss_after: SHORT_NOTICE,
            },
            _ => NoticeKind::Transient {
                dismiss_after: LONG_NOTICE,
            },
        };
        Self {
            text: error.user_message(),
            kind,
        }
    }
}

/// What the session is doing "right now".
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A message joined the log (user message, greeting, or reply placeholder).
    MessageAppended(Message),
    /// A fragment was appended to the streaming reply.
    MessageUpdated {
        /// Reply being streamed.
        id: MessageId,
        /// The text just appended.
        fragment: String,
    },
    /// The reply stopped streaming. Carries its final content.
    MessageFinalized(Message),
    /// Something to show outside the log.
    Notice(Notice),
    /// Voice playback started or ended.
    Playback(PlaybackState),
    /// Microphone slot changed state.
    Recording(RecordingState),
    /// Voice mode switched on or off.
    VoiceMode {
        /// New value.
        enabled: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::persona;

    #[test]
    fn permission_denied_is_a_prompt() {
        let notice = Notice::for_error(&ChatError::PermissionDenied("denied".into()));
        assert_eq!(notice.kind, NoticeKind::PermissionPrompt);
        assert_eq!(notice.text, persona::PERMISSION_DENIED_NOTICE);
    }

    #[test]
    fn dismissal_delays() {
        let empty = Notice::for_error(&ChatError::Transcription(NO_TRANSCRIPT.into()));
        assert_eq!(
            empty.kind,
            NoticeKind::Transient {
                dismiss_after: SHORT_NOTICE
            }
        );

        let start = Notice::for_error(&ChatError::Capture("no default input device".into()));
        assert_eq!(start.text, persona::CAPTURE_START_NOTICE);
        assert_eq!(
            start.kind,
            NoticeKind::Transient {
                dismiss_after: SHORT_NOTICE
            }
        );

        let failed = Notice::for_error(&ChatError::Transcription("timeout".into()));
        assert_eq!(
            failed.kind,
            NoticeKind::Transient {
                dismiss_after: LONG_NOTICE
            }
        );
    }
}
