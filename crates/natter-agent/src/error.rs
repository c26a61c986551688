//! Error types for natter-agent

use thiserror::Error;

/// Result type alias using natter-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the provider layer
    #[error(transparent)]
    Ai(#[from] natter_ai::Error),

    /// Persisted messages do not form a valid conversation
    #[error("Invalid history: {0}")]
    InvalidHistory(String),
}

impl Error {
    /// Check if this error is a configuration problem
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::Ai(e) => e.is_configuration(),
            Error::InvalidHistory(_) => false,
        }
    }
}
