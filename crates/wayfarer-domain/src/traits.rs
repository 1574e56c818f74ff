//! Trait definitions for external interactions
//!
//! These traits are the seams between the streaming engine and the outside
//! world. Implementations live in other crates (wayfarer-llm, wayfarer-store).

use crate::{Chat, ChatId, EntityDescription, Fragment, TurnRecord};
use std::fmt::Display;
use std::future::Future;

/// A finite, ordered source of text fragments for one turn
///
/// Implemented by the model provider layer (wayfarer-llm)
pub trait FragmentSource: Send {
    /// Error type for source failures
    type Error: Display + Send;

    /// Yield the next fragment
    ///
    /// `Ok(None)` means the source ended without a completion signal
    /// (e.g. a disconnect). Callers never poll again after a
    /// [`Fragment::Done`] or `Ok(None)`.
    fn next_fragment(
        &mut self,
    ) -> impl Future<Output = Result<Option<Fragment>, Self::Error>> + Send;
}

/// Obtains a short descriptive fact for an entity
///
/// Implemented by the model provider layer (wayfarer-llm)
pub trait Describer: Send + Sync {
    /// Error type for describe failures
    type Error: Display + Send;

    /// Describe the entity named by a sealed span
    fn describe(
        &self,
        entity: &str,
    ) -> impl Future<Output = Result<EntityDescription, Self::Error>> + Send;
}

/// Resolves a representative locator (e.g. a picture URL) for a name
///
/// Implemented by the model provider layer (wayfarer-llm)
pub trait ReferenceResolver: Send + Sync {
    /// Error type for resolution failures
    type Error: Display + Send;

    /// Resolve a locator for the given display name
    fn resolve_reference(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Durable storage for turn records
///
/// Implemented by the infrastructure layer (wayfarer-store)
pub trait TurnStore {
    /// Error type for store operations
    type Error;

    /// Persist one record under a chat
    fn save_turn(&mut self, chat_id: &ChatId, record: &TurnRecord) -> Result<(), Self::Error>;

    /// Records of a chat in the order they were saved
    fn load_turns(&self, chat_id: &ChatId) -> Result<Vec<TurnRecord>, Self::Error>;
}

/// Durable storage for chat metadata
///
/// Implemented by the infrastructure layer (wayfarer-store)
pub trait ChatStore: TurnStore {
    /// Insert or update the chat's metadata (id, title, created_at, path)
    ///
    /// Messages are persisted individually through [`TurnStore::save_turn`].
    fn save_chat(&mut self, chat: &Chat) -> Result<(), Self::Error>;

    /// Load a chat with all of its messages
    fn load_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>, Self::Error>;

    /// All chats, newest first, without their messages
    fn list_chats(&self) -> Result<Vec<Chat>, Self::Error>;
}
