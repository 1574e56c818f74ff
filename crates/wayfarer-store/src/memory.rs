//! In-memory store

use crate::StoreError;
use std::collections::{HashMap, HashSet};
use wayfarer_domain::traits::{ChatStore, TurnStore};
use wayfarer_domain::{Chat, ChatId, MessageId, TurnRecord};

/// Chats and records kept in process memory
///
/// Same contract as [`SqliteStore`](crate::SqliteStore): records are
/// write-once and returned in save order.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    chats: Vec<Chat>,
    turns: HashMap<ChatId, Vec<TurnRecord>>,
    ids: HashSet<MessageId>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of saved records across all chats
    pub fn turn_count(&self) -> usize {
        self.ids.len()
    }
}

impl TurnStore for MemoryStore {
    type Error = StoreError;

    fn save_turn(&mut self, chat_id: &ChatId, record: &TurnRecord) -> Result<(), Self::Error> {
        if !self.ids.insert(record.id) {
            return Err(StoreError::Duplicate(record.id.to_string()));
        }
        self.turns
            .entry(chat_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn load_turns(&self, chat_id: &ChatId) -> Result<Vec<TurnRecord>, Self::Error> {
        Ok(self.turns.get(chat_id).cloned().unwrap_or_default())
    }
}

impl ChatStore for MemoryStore {
    fn save_chat(&mut self, chat: &Chat) -> Result<(), Self::Error> {
        let metadata = Chat {
            messages: Vec::new(),
            ..chat.clone()
        };
        match self.chats.iter_mut().find(|c| c.id == chat.id) {
            Some(existing) => {
                existing.title = metadata.title;
                existing.path = metadata.path;
            }
            None => self.chats.push(metadata),
        }
        Ok(())
    }

    fn load_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>, Self::Error> {
        let Some(chat) = self.chats.iter().find(|c| &c.id == chat_id) else {
            return Ok(None);
        };
        let mut chat = chat.clone();
        chat.messages = self.load_turns(chat_id)?;
        Ok(Some(chat))
    }

    fn list_chats(&self) -> Result<Vec<Chat>, Self::Error> {
        let mut chats: Vec<Chat> = self.chats.iter().rev().cloned().collect();
        // Stable sort keeps newest-saved first among equal timestamps
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_domain::Role;

    #[test]
    fn test_turns_in_save_order() {
        let mut store = MemoryStore::new();
        let chat_id = ChatId::new();
        let first = TurnRecord::user("first");
        let second = TurnRecord::new(MessageId::new(), Role::Assistant, "second");

        store.save_turn(&chat_id, &first).unwrap();
        store.save_turn(&chat_id, &second).unwrap();

        assert_eq!(store.load_turns(&chat_id).unwrap(), vec![first, second]);
        assert!(store.load_turns(&ChatId::new()).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut store = MemoryStore::new();
        let record = TurnRecord::user("once");
        store.save_turn(&ChatId::new(), &record).unwrap();

        let err = store.save_turn(&ChatId::new(), &record).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.turn_count(), 1);
    }

    #[test]
    fn test_chat_metadata_upsert_and_load() {
        let mut store = MemoryStore::new();
        let mut chat = Chat::new(ChatId::from_string("c1"));
        store.save_chat(&chat).unwrap();

        let message = TurnRecord::user("Best time to visit Kyoto?");
        chat.push(message.clone());
        store.save_turn(&chat.id, &message).unwrap();
        store.save_chat(&chat).unwrap();

        let loaded = store.load_chat(&chat.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Best time to visit Kyoto?");
        assert_eq!(loaded.messages, vec![message]);
        assert_eq!(store.list_chats().unwrap().len(), 1);
        assert!(store.list_chats().unwrap()[0].messages.is_empty());
    }

    #[test]
    fn test_list_chats_newest_first() {
        let mut store = MemoryStore::new();
        let mut older = Chat::new(ChatId::from_string("older"));
        older.created_at = 10;
        let mut newer = Chat::new(ChatId::from_string("newer"));
        newer.created_at = 20;

        store.save_chat(&older).unwrap();
        store.save_chat(&newer).unwrap();

        let ids: Vec<_> = store
            .list_chats()
            .unwrap()
            .into_iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }
}
