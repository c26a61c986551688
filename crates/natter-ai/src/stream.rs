//! Streaming event types

use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::Stream;

use crate::Error;

/// Events emitted for one conversational turn.
///
/// `Started` comes first, then any number of `Delta`s, then exactly one
/// terminal event (`Completed`, `Failed` or `Cancelled`).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The turn was accepted
    Started,
    /// More text arrived. `text` is cumulative; `fragment` is the new part.
    Delta { text: String, fragment: String },
    /// The assistant reply, already committed to the conversation
    Completed { text: String },
    /// The turn failed; the conversation is unchanged
    Failed { error: Arc<Error> },
    /// The turn was cancelled; the conversation is unchanged
    Cancelled,
}

impl StreamEvent {
    pub(crate) fn failed(error: Error) -> Self {
        Self::Failed {
            error: Arc::new(error),
        }
    }

    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Completed { .. } | StreamEvent::Failed { .. } | StreamEvent::Cancelled
        )
    }

    /// Get the error if this is a Failed event
    pub fn error(&self) -> Option<&Error> {
        match self {
            StreamEvent::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl From<Error> for StreamEvent {
    fn from(error: Error) -> Self {
        match error {
            Error::Cancelled => StreamEvent::Cancelled,
            other => StreamEvent::failed(other),
        }
    }
}

/// A stream of turn events
pub type StreamEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_terminal_variants() {
        assert!(!StreamEvent::Started.is_terminal());
        assert!(
            !StreamEvent::Delta {
                text: "a".into(),
                fragment: "a".into()
            }
            .is_terminal()
        );
        assert!(StreamEvent::Completed { text: "a".into() }.is_terminal());
        assert!(StreamEvent::from(Error::StreamTruncated).is_terminal());
        assert!(StreamEvent::Cancelled.is_terminal());
    }

    #[test]
    fn test_from_error() {
        assert!(matches!(StreamEvent::from(Error::Cancelled), StreamEvent::Cancelled));
        let event = StreamEvent::from(Error::status(401, "nope"));
        assert_eq!(event.error().map(|e| e.kind()), Some(ErrorKind::Transport));
    }
}
