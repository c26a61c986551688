//! Conversation state: the system prompt and committed turns.

use natter_ai::{Message, Role};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Append-only message log. `messages()[0]` is always the system message.
///
/// Serializes as a plain message list; deserializing goes through
/// [`Conversation::restore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Message>", into = "Vec<Message>")]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation with the given system prompt
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Rebuild a conversation from persisted messages.
    ///
    /// The first message must be the only system message.
    pub fn restore(messages: Vec<Message>) -> Result<Self> {
        match messages.first() {
            Some(first) if first.role == Role::System => {}
            _ => {
                return Err(Error::InvalidHistory(
                    "first message must be the system prompt".into(),
                ));
            }
        }
        if messages[1..].iter().any(|m| m.role == Role::System) {
            return Err(Error::InvalidHistory(
                "system message after the first entry".into(),
            ));
        }
        Ok(Self { messages })
    }

    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    /// All messages, system prompt first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of committed user/assistant pairs
    pub fn turns(&self) -> usize {
        self.messages[1..]
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count()
    }

    /// Append one completed turn. Both messages go in together or not at all.
    pub(crate) fn commit_turn(&mut self, user: Message, assistant: Message) {
        self.messages.reserve(2);
        self.messages.push(user);
        self.messages.push(assistant);
    }
}

impl TryFrom<Vec<Message>> for Conversation {
    type Error = Error;

    fn try_from(messages: Vec<Message>) -> Result<Self> {
        Self::restore(messages)
    }
}

impl From<Conversation> for Vec<Message> {
    fn from(conversation: Conversation) -> Self {
        conversation.messages
    }
}
