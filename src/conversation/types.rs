//! Message records shown in the conversation view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier given to bot messages so streamed fragments can target them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human.
    User,
    /// Chat'Bruti.
    Bot,
}

/// One entry of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Text shown in the bubble.
    pub content: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// True while fragments are still arriving.
    #[serde(default)]
    pub is_streaming: bool,
    /// Set on bot messages; user messages carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
}

impl Message {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            is_streaming: false,
            id: None,
        }
    }

    /// A complete bot message with a fresh identifier.
    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            content: content.into(),
            timestamp: Utc::now(),
            is_streaming: false,
            id: Some(MessageId::new()),
        }
    }

    /// An empty bot message awaiting fragments.
    pub fn streaming_placeholder(id: MessageId) -> Self {
        Self {
            role: Role::Bot,
            content: String::new(),
            timestamp: Utc::now(),
            is_streaming: true,
            id: Some(id),
        }
    }
}
