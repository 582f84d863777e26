//! Completion client for the OpenAI-compatible chat completions endpoint.
//!
//! Sends the persona plus the user's question with `stream: true`, decodes
//! the body with [`decode_fragments`] and guarantees a non-empty reply: when
//! the model streams nothing usable, one of the persona's fallback lines is
//! delivered instead.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bruti::config::ChatConfig;
//! use bruti::llm::client::CompletionClient;
//!
//! # async fn example() -> bruti::Result<()> {
//! let config = ChatConfig::load()?;
//! let client = CompletionClient::from_config(&config)?;
//! let reply = client.complete("2+2 ?", |fragment| print!("{fragment}")).await?;
//! println!("\n{reply}");
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use crate::config::{ApiConfig, ChatConfig, CompletionConfig};
use crate::error::{ChatError, Result};
use crate::llm::persona;
use crate::llm::stream::{FragmentStream, StreamFragment, decode_fragments};

/// One item of a reply stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyChunk {
    /// Text streamed by the model.
    Text(StreamFragment),
    /// Substitute reply used because the model streamed no usable text.
    /// Replaces anything streamed before it.
    Fallback(&'static str),
}

impl ReplyChunk {
    /// The text carried by this chunk.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(fragment) => &fragment.text,
            Self::Fallback(text) => text,
        }
    }
}

/// A consumable stream of reply chunks that always ends with non-empty text.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<ReplyChunk>> + Send>>;

/// Build the JSON request body for a streamed chat completion.
pub fn build_completions_request(config: &CompletionConfig, message: &str) -> serde_json::Value {
    serde_json::json!({
        "messages": [
            {"role": "system", "content": config.system_prompt},
            {"role": "user", "content": persona::user_prompt(message)},
        ],
        "model": config.model,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
        "top_p": config.top_p,
        "frequency_penalty": config.frequency_penalty,
        "presence_penalty": config.presence_penalty,
        "stream": true,
    })
}

/// Streaming chat completion client.
pub struct CompletionClient {
    url: String,
    api_key: String,
    config: CompletionConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("url", &self.url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl CompletionClient {
    /// Create a client, resolving the API key up front.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no API key is configured.
    pub fn new(api: &ApiConfig, config: CompletionConfig) -> Result<Self> {
        let api_key = api.resolve_api_key()?;
        Ok(Self {
            url: api.endpoint("chat/completions"),
            api_key,
            config,
            client: reqwest::Client::new(),
        })
    }

    /// Create a client from the full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no API key is configured.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::new(&config.api, config.completion.clone())
    }

    /// Open the streaming request and return the raw decoded fragments.
    ///
    /// # Errors
    ///
    /// Fails on an empty message, a transport error, or a non-success status.
    pub async fn open_stream(&self, message: &str) -> Result<FragmentStream> {
        if message.trim().is_empty() {
            return Err(ChatError::Config("message is required".into()));
        }

        tracing::info!(question = message, "sending completion request");
        let body = build_completions_request(&self.config, message);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Request(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        Ok(decode_fragments(response.bytes_stream()))
    }

    /// Open the streaming request and return a reply stream with the
    /// empty-reply fallback applied.
    ///
    /// # Errors
    ///
    /// Same as [`CompletionClient::open_stream`].
    pub async fn stream_reply(&self, message: &str) -> Result<ReplyStream> {
        let fragments = self.open_stream(message).await?;
        Ok(with_fallback(fragments))
    }

    /// Stream a reply, calling `on_fragment` for each piece of text.
    ///
    /// Returns the full reply, which is never empty.
    ///
    /// # Errors
    ///
    /// Fails on an empty message, a transport error, a non-success status or
    /// a failed body read. The caller decides what to show instead.
    pub async fn complete<F>(&self, message: &str, mut on_fragment: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        let mut stream = self.stream_reply(message).await?;
        let mut full = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            on_fragment(chunk.text());
            match chunk {
                ReplyChunk::Text(fragment) => full.push_str(&fragment.text),
                ReplyChunk::Fallback(text) => full = text.to_owned(),
            }
        }

        Ok(full)
    }
}

/// Append the fallback reply when `fragments` carries no visible text.
pub fn with_fallback(fragments: FragmentStream) -> ReplyStream {
    let state = FallbackState {
        fragments,
        full: String::new(),
        count: 0,
        done: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        match state.fragments.next().await {
            Some(Ok(fragment)) => {
                state.count += 1;
                tracing::trace!(seq = fragment.seq, text = %fragment.text, "fragment");
                state.full.push_str(&fragment.text);
                Some((Ok(ReplyChunk::Text(fragment)), state))
            }
            Some(Err(e)) => {
                state.done = true;
                Some((Err(e), state))
            }
            None => {
                state.done = true;
                if state.full.trim().is_empty() {
                    let fallback = persona::fallback_reply();
                    tracing::info!(fallback, "model returned no text, using fallback reply");
                    Some((Ok(ReplyChunk::Fallback(fallback)), state))
                } else {
                    tracing::info!(
                        fragments = state.count,
                        response = %state.full,
                        "completion finished"
                    );
                    None
                }
            }
        }
    }))
}

struct FallbackState {
    fragments: FragmentStream,
    full: String,
    count: usize,
    done: bool,
}

/// Map an HTTP error status to the appropriate [`ChatError`].
pub(crate) fn map_http_error(status: reqwest::StatusCode, body: &str) -> ChatError {
    let message = extract_error_message(body)
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
    match status.as_u16() {
        401 | 403 => ChatError::Auth(message),
        429 => ChatError::Request(format!("rate limited: {message}")),
        _ => ChatError::Provider(message),
    }
}

/// Extract `error.message` from an error response body.
fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .get("message")?
        .as_str()
        .map(String::from)
}
