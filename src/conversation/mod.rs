//! Conversation log: message records and the store that orders them.

pub mod store;
pub mod types;

pub use store::ConversationStore;
pub use types::{Message, MessageId, Role};
