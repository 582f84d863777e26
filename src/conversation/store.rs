//! Ordered conversation log with one in-flight bot message.
//!
//! Messages are never removed or reordered. The only mutation allowed after
//! insertion is appending fragments to the streaming bot message, and
//! finalizing it.

use super::types::{Message, MessageId};
use crate::error::{ChatError, Result};
use crate::llm::persona;

/// Conversation log.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    /// Create an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation that opens with the bot's greeting.
    #[must_use]
    pub fn with_greeting() -> Self {
        Self {
            messages: vec![Message::bot(persona::GREETING)],
        }
    }

    /// Append a finished message.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Busy`] if `message` is flagged as streaming while
    /// another message already is.
    pub fn append(&mut self, message: Message) -> Result<()> {
        if message.is_streaming {
            self.ensure_idle()?;
        }
        self.messages.push(message);
        Ok(())
    }

    /// Append an empty bot message that will receive fragments under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Busy`] if a message is already streaming, and
    /// [`ChatError::Config`] if `id` is already in use.
    pub fn append_streaming_placeholder(&mut self, id: MessageId) -> Result<()> {
        self.ensure_idle()?;
        if self.get(id).is_some() {
            return Err(ChatError::Config(format!("message id {id} already exists")));
        }
        self.messages.push(Message::streaming_placeholder(id));
        Ok(())
    }

    /// Append `fragment` to the streaming message `id`.
    ///
    /// Returns `false` (and changes nothing) if no streaming message has
    /// that id.
    pub fn mutate(&mut self, id: MessageId, fragment: &str) -> bool {
        match self.find_mut(id) {
            Some(msg) if msg.is_streaming => {
                msg.content.push_str(fragment);
                true
            }
            _ => false,
        }
    }

    /// Clear the streaming flag of `id`, optionally replacing its content.
    ///
    /// Returns `false` (and changes nothing) if no streaming message has
    /// that id. Finalized messages stay frozen.
    pub fn finalize(&mut self, id: MessageId, replacement: Option<&str>) -> bool {
        let Some(msg) = self.find_mut(id).filter(|m| m.is_streaming) else {
            return false;
        };
        if let Some(text) = replacement {
            msg.content = text.to_owned();
        }
        msg.is_streaming = false;
        true
    }

    /// All messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a bot message by id.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == Some(id))
    }

    /// The message currently receiving fragments, if any.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_streaming)
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn find_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == Some(id))
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.streaming_message() {
            Some(msg) => Err(ChatError::Busy(format!(
                "message {} is still streaming",
                msg.id.map(|id| id.to_string()).unwrap_or_default()
            ))),
            None => Ok(()),
        }
    }
}
