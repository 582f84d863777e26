//! Line framing for OpenAI-style streaming responses.
//!
//! The completion endpoint sends one JSON record per line:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"It's"}}]}
//! data: {"choices":[{"delta":{"content":" obviously"}}]}
//! data: [DONE]
//! ```
//!
//! [`DataLineParser`] turns raw body chunks into [`DataLine`]s. Bytes are
//! buffered until a newline arrives, so a line (or a multi-byte character)
//! split across two chunks is reassembled before it is framed.
//!
//! # Examples
//!
//! ```
//! use bruti::llm::sse::{DataLine, DataLineParser};
//!
//! let mut parser = DataLineParser::new();
//! assert!(parser.push(b"data: hel").is_empty());
//! let lines = parser.push(b"lo\ndata: [DONE]\n");
//! assert_eq!(lines, vec![DataLine::Payload("hello".into()), DataLine::Done]);
//! ```

/// Prefix that marks a payload-carrying line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One framed `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLine {
    /// A payload to be parsed as JSON.
    Payload(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Frame a single line. Returns `None` for lines that carry no payload.
pub fn frame_line(line: &str) -> Option<DataLine> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let data = line.strip_prefix(DATA_PREFIX)?.trim();
    if data == DONE_SENTINEL {
        return Some(DataLine::Done);
    }
    Some(DataLine::Payload(data.to_owned()))
}

/// Incrementally frame body chunks into [`DataLine`]s.
#[derive(Debug, Default)]
pub struct DataLineParser {
    pending: Vec<u8>,
}

impl DataLineParser {
    /// Create a new parser with an empty line buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes into the parser.
    ///
    /// Returns the data lines completed by this chunk, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DataLine> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            if let Some(line) = frame_line(&text) {
                lines.push(line);
            }
        }

        lines
    }

    /// Frame whatever is left once the body has ended without a newline.
    pub fn flush(&mut self) -> Option<DataLine> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        frame_line(&String::from_utf8_lossy(&raw))
    }
}

/// Extract `choices[0].delta.content` from one payload.
///
/// Returns `None` for malformed JSON, missing fields and empty content.
pub fn delta_content(payload: &str) -> Option<String> {
    let chunk: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            if !payload.is_empty() {
                tracing::warn!(error = %e, data = payload, "could not parse SSE data");
            }
            return None;
        }
    };

    chunk["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|content| !content.is_empty())
        .map(str::to_owned)
}
