//! Turn records - the durable shape of every message in a chat

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a message based on UUIDv7
///
/// UUIDv7 keeps messages of one chat chronologically sortable without a
/// separate sequence column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MessageId(u128);

impl MessageId {
    /// Generate a new UUIDv7-based MessageId
    ///
    /// # Examples
    ///
    /// ```
    /// use wayfarer_domain::MessageId;
    ///
    /// let id = MessageId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a MessageId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a MessageId from its hyphenated string form
    ///
    /// # Examples
    ///
    /// ```
    /// use wayfarer_domain::MessageId;
    ///
    /// let id = MessageId::new();
    /// let parsed = MessageId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid message id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Milliseconds since the Unix epoch encoded in the id
    pub fn timestamp(&self) -> u64 {
        (self.0 >> 80) as u64
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for MessageId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_string(&s)
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation
    User,
    /// The model's reply
    Assistant,
    /// Instructions and bookkeeping that are never rendered
    System,
}

impl Role {
    /// Lowercase wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Parse the lowercase wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Landmark information attached to an assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmark {
    /// Short description of the landmark
    pub info: String,
    /// Locator of a picture of the landmark
    pub url: String,
}

/// One durable message of a chat
///
/// For assistant turns the text has every delimiter stripped and the span text
/// removed; the span itself lives in `location`. Records are immutable once
/// handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Unique identifier
    pub id: MessageId,

    /// Author of the message
    pub role: Role,

    /// Message text
    pub text: String,

    /// Place mention found in the turn, if a span was sealed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Enrichment found for the location, absent when enrichment degraded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<Landmark>,

    /// The fragment source stopped before its completion signal
    #[serde(default)]
    pub aborted: bool,

    /// Creation time (seconds since the Unix epoch)
    pub created_at: u64,
}

impl TurnRecord {
    /// Create a plain record with no span information
    pub fn new(id: MessageId, role: Role, text: impl Into<String>) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            location: None,
            landmark: None,
            aborted: false,
            created_at: now_secs(),
        }
    }

    /// Create a user message with a fresh id
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageId::new(), Role::User, text)
    }

    /// Create a system message with a fresh id
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageId::new(), Role::System, text)
    }
}

/// Current wall-clock time in seconds since the Unix epoch
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
