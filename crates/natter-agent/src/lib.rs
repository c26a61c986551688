//! natter-agent: chat session runtime
//!
//! This crate owns the conversation history and drives one streamed
//! request at a time through a [`natter_ai::Transport`], reporting progress
//! as [`natter_ai::StreamEvent`]s.

pub mod conversation;
pub mod error;
pub mod handle;
pub mod session;

pub use conversation::Conversation;
pub use error::{Error, Result};
pub use handle::SessionHandle;
pub use session::ChatSession;
