//! Chats - an ordered list of turn records under one id

use crate::turn::{now_secs, Role, TurnRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of characters of the first message used as a chat title
pub const TITLE_MAX_CHARS: usize = 100;

/// Identifier of a chat
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Generate a fresh chat id
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().simple().to_string())
    }

    /// Wrap an existing id (e.g. one loaded from storage)
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat as persisted: metadata plus its messages in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Chat identifier
    pub id: ChatId,

    /// Title derived from the first message
    pub title: String,

    /// Creation time (seconds since the Unix epoch)
    pub created_at: u64,

    /// Route under which the chat is reachable
    pub path: String,

    /// Messages in chronological order
    pub messages: Vec<TurnRecord>,
}

impl Chat {
    /// Create an empty chat
    pub fn new(id: ChatId) -> Self {
        let path = format!("/chat/{}", id);
        Self {
            id,
            title: String::new(),
            created_at: now_secs(),
            path,
            messages: Vec::new(),
        }
    }

    /// Append a message, deriving the title from the first one
    pub fn push(&mut self, message: TurnRecord) {
        if self.messages.is_empty() {
            self.title = title_from(&message.text);
        }
        self.messages.push(message);
    }

    /// Messages a rendering layer should show (system messages are hidden)
    pub fn visible_messages(&self) -> impl Iterator<Item = (usize, &TurnRecord)> {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .enumerate()
    }
}

/// First [`TITLE_MAX_CHARS`] characters of a message
pub fn title_from(text: &str) -> String {
    text.chars().take(TITLE_MAX_CHARS).collect()
}
