//! Conversation turn types for chatrelay.
//!
//! A session's history is an ordered list of [`ChatTurn`]s. Turns are
//! immutable once appended to the store.

use serde::{Deserialize, Serialize};

// Re-export MessageRole from llm module (turns and provider messages share roles).
pub use crate::llm::MessageRole;

use crate::llm::Message;

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

impl From<ChatTurn> for Message {
    fn from(turn: ChatTurn) -> Self {
        Message {
            role: turn.role,
            content: turn.content,
        }
    }
}
