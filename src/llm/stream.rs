//! Stream decoder: response body bytes → text fragments.
//!
//! [`decode_fragments`] wraps any byte stream and yields each non-empty
//! `choices[0].delta.content` as a [`StreamFragment`], in body order. The
//! stream is lazy, finite and cannot be restarted. It ends at `[DONE]` or at
//! end-of-body; a failed read is yielded once as an error and ends it.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::{ChatError, Result};
use crate::llm::sse::{DataLine, DataLineParser, delta_content};

/// One incremental piece of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFragment {
    /// The text delta.
    pub text: String,
    /// Zero-based position within the stream (diagnostics only).
    pub seq: usize,
}

/// A boxed stream of decoded fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamFragment>> + Send>>;

/// Decode a response body into a [`FragmentStream`].
pub fn decode_fragments<S, E>(byte_stream: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        byte_stream: Box::pin(byte_stream),
        parser: DataLineParser::new(),
        pending: VecDeque::new(),
        next_seq: 0,
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                let fragment = StreamFragment {
                    text,
                    seq: state.next_seq,
                };
                state.next_seq += 1;
                return Some((Ok(fragment), state));
            }

            if state.finished {
                tracing::debug!(fragments = state.next_seq, "stream decoded");
                return None;
            }

            match state.byte_stream.next().await {
                Some(Ok(chunk)) => {
                    let lines = state.parser.push(&chunk);
                    state.accept(lines);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((
                        Err(ChatError::Stream(format!("stream read error: {e}"))),
                        state,
                    ));
                }
                None => {
                    let tail = state.parser.flush();
                    state.accept(tail);
                    state.finished = true;
                }
            }
        }
    }))
}

struct DecodeState<E> {
    byte_stream: Pin<Box<dyn Stream<Item = std::result::Result<Bytes, E>> + Send>>,
    parser: DataLineParser,
    pending: VecDeque<String>,
    next_seq: usize,
    finished: bool,
}

impl<E> DecodeState<E> {
    /// Queue the content of framed lines, stopping at `[DONE]`.
    fn accept(&mut self, lines: impl IntoIterator<Item = DataLine>) {
        for line in lines {
            match line {
                DataLine::Done => {
                    self.finished = true;
                    return;
                }
                DataLine::Payload(payload) => {
                    if let Some(content) = delta_content(&payload) {
                        self.pending.push_back(content);
                    }
                }
            }
        }
    }
}
