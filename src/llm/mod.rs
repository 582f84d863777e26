//! Chat completion over the streaming HTTP API.
//!
//! - [`sse`]: `data:` line framing and delta extraction
//! - [`stream`]: byte stream → [`StreamFragment`] stream
//! - [`client`]: request building, status mapping, empty-reply fallback
//! - [`persona`]: the Chat'Bruti system prompt and fixed texts

pub mod client;
pub mod persona;
pub mod sse;
pub mod stream;

pub use client::{CompletionClient, ReplyChunk, ReplyStream};
pub use stream::{FragmentStream, StreamFragment};
