//! Error types for natter-ai

use thiserror::Error;

/// Result type alias using natter-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a chat-completion provider
#[derive(Error, Debug)]
pub enum Error {
    /// Provider id is not in the registry
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Model id is not offered by the provider
    #[error("Unknown model '{model}' for provider '{provider}'")]
    UnknownModel { provider: String, model: String },

    /// Endpoint is not an absolute http(s) URL
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    /// Neither the request config nor the provider supplies a key
    #[error("Missing API key for provider: {0}")]
    MissingApiKey(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Streaming body ended before the `[DONE]` marker
    #[error("Stream ended before completion marker")]
    StreamTruncated,

    /// Another request is still running against the same conversation
    #[error("A request is already in flight for this session")]
    RequestInFlight,

    /// Response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request was cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unresolved provider/model, bad endpoint, missing credentials
    Configuration,
    /// Connection failure, non-2xx status, truncated body
    Transport,
    /// Malformed or unexpected JSON
    Decode,
    /// Another request holds the session; nothing was sent
    Busy,
    /// Caller cancelled; terminal but not a failure
    Cancelled,
}

impl Error {
    /// Create a status error from code and body text
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownProvider(_)
            | Error::UnknownModel { .. }
            | Error::InvalidEndpoint(_)
            | Error::MissingApiKey(_)
            | Error::InvalidConfig(_) => ErrorKind::Configuration,
            Error::Http(_)
            | Error::Status { .. }
            | Error::StreamTruncated => ErrorKind::Transport,
            Error::RequestInFlight => ErrorKind::Busy,
            Error::Decode(_) | Error::Json(_) => ErrorKind::Decode,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Check if re-sending the same turn may succeed.
    ///
    /// Nothing in this crate retries; this is advice for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::Status { status, .. } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            Error::StreamTruncated | Error::RequestInFlight => true,
            _ => false,
        }
    }

    /// Check if this error is a configuration problem
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
