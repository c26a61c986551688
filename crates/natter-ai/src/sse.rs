//! Incremental decoder for chat-completion SSE bodies.
//!
//! Bytes are buffered until a newline is seen, so the decoded text does not
//! depend on how the transport fragments the body. Splitting on `\n` never
//! cuts a UTF-8 sequence, which keeps sub-character chunks safe too.

use serde::Deserialize;

use crate::{Error, Result};

/// Line that ends a well-formed stream
pub const DONE_MARKER: &str = "data: [DONE]";

const DATA_PREFIX: &str = "data: ";

/// Decoder state.
///
/// Line dispatch happens synchronously inside [`SseDecoder::feed`], so the
/// transient "line ready" and "dispatched" steps are never observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseState {
    /// No partial line buffered
    AwaitingBytes,
    /// Holding the start of a line that has no newline yet
    Buffering,
    /// Saw `data: [DONE]`; further input is ignored
    Done,
    /// Stopped by cancellation, transport error or premature end of body
    Aborted,
}

/// Output of the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// New content arrived. `text` is everything so far, `fragment` the new piece.
    Delta { text: String, fragment: String },
    /// The completion marker was seen
    Done { text: String },
}

/// Byte buffer -> line -> JSON fragment -> cumulative text
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    full_text: String,
    state: SseState,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            full_text: String::new(),
            state: SseState::AwaitingBytes,
        }
    }

    pub fn state(&self) -> SseState {
        self.state
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.full_text
    }

    /// Whether the stream has reached a final state
    pub fn is_finished(&self) -> bool {
        matches!(self.state, SseState::Done | SseState::Aborted)
    }

    /// Consume one chunk of the body and return the events it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if self.is_finished() {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if let Some(event) = self.dispatch(&line) {
                let done = matches!(event, SseEvent::Done { .. });
                events.push(event);
                if done {
                    self.state = SseState::Done;
                    self.buffer.clear();
                    return events;
                }
            }
        }

        self.state = if self.buffer.is_empty() {
            SseState::AwaitingBytes
        } else {
            SseState::Buffering
        };
        events
    }

    /// Called when the transport has no more bytes.
    ///
    /// Returns the full text if the completion marker was seen, otherwise
    /// moves to [`SseState::Aborted`] and reports a truncated stream.
    pub fn finish(&mut self) -> Result<String> {
        match self.state {
            SseState::Done => Ok(self.full_text.clone()),
            _ => {
                self.abort();
                Err(Error::StreamTruncated)
            }
        }
    }

    /// Stop decoding and discard anything buffered
    pub fn abort(&mut self) {
        if self.state != SseState::Done {
            self.state = SseState::Aborted;
        }
        self.buffer.clear();
    }

    fn dispatch(&mut self, line: &[u8]) -> Option<SseEvent> {
        if line.is_empty() {
            return None;
        }

        let Ok(line) = std::str::from_utf8(line) else {
            tracing::debug!("Skipping SSE line with invalid UTF-8");
            return None;
        };

        if line == DONE_MARKER {
            return Some(SseEvent::Done {
                text: self.full_text.clone(),
            });
        }

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            tracing::debug!("Skipping non-data SSE line: {}", line);
            return None;
        };

        let chunk: StreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!("Skipping malformed SSE fragment: {}", e);
                return None;
            }
        };

        if let Some(error) = chunk.error {
            tracing::warn!("Provider reported an error mid-stream: {}", error);
            return None;
        }

        let fragment = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|c| !c.is_empty())?;

        self.full_text.push_str(&fragment);
        Some(SseEvent::Delta {
            text: self.full_text.clone(),
            fragment,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
