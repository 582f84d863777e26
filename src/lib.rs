//! Bruti: a streaming chat client for Chat'Bruti, a deliberately useless
//! chatbot.
//!
//! A question goes out to an OpenAI-compatible chat completions endpoint and
//! the reply streams back fragment by fragment into a conversation log:
//! Question → Completion stream → Conversation → (optional) Voice
//!
//! # Architecture
//!
//! - **LLM**: streamed completions decoded from `data:` lines ([`llm`])
//! - **Conversation**: ordered log with one in-flight bot message ([`conversation`])
//! - **Voice**: language detection, voice choice and the synthesis fallback chain ([`voice`])
//! - **TTS**: HTTP speech synthesis played through `cpal` ([`tts`], [`audio`])
//! - **Capture**: microphone recording handed to transcription ([`capture`], [`stt`])
//! - **Session**: ties the above together and emits [`SessionEvent`]s ([`session`])

pub mod audio;
pub mod capture;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod runtime;
pub mod session;
pub mod stt;
pub mod tts;
pub mod voice;

pub use config::ChatConfig;
pub use error::{ChatError, Result};
pub use runtime::{Notice, NoticeKind, SessionEvent};
pub use session::{ChatSession, RecordingOutcome, SendOutcome};
