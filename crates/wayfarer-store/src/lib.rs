//! Wayfarer Storage Layer
//!
//! Implements the `TurnStore` and `ChatStore` traits from `wayfarer-domain`.
//!
//! # Stores
//!
//! - [`SqliteStore`]: durable chats and turn records in SQLite
//! - [`MemoryStore`]: in-process store for tests and ephemeral sessions
//!
//! # Examples
//!
//! ```no_run
//! use wayfarer_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for chat operations
//! ```

#![warn(missing_docs)]

mod memory;

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;
use wayfarer_domain::traits::{ChatStore, TurnStore};
use wayfarer_domain::{Chat, ChatId, Landmark, MessageId, Role, TurnRecord};

pub use memory::MemoryStore;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Landmark column could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A record with this id was already saved
    #[error("Duplicate turn record: {0}")]
    Duplicate(String),
}

/// SQLite-based implementation of [`ChatStore`]
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share one store behind a mutex or
/// give each thread its own SqliteStore instance.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wayfarer_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("wayfarer.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    /// Convert MessageId to bytes for storage
    fn message_id_to_bytes(id: MessageId) -> Vec<u8> {
        id.value().to_be_bytes().to_vec()
    }

    /// Convert bytes to MessageId
    fn bytes_to_message_id(bytes: &[u8]) -> Result<MessageId, StoreError> {
        if bytes.len() != 16 {
            return Err(StoreError::InvalidData(format!(
                "Expected 16 bytes for MessageId, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(bytes);
        Ok(MessageId::from_value(u128::from_be_bytes(arr)))
    }

    fn conversion_error(column: usize, ty: rusqlite::types::Type, e: StoreError) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(column, ty, Box::new(e))
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TurnRecord> {
        use rusqlite::types::Type;

        let id_bytes: Vec<u8> = row.get(0)?;
        let id = Self::bytes_to_message_id(&id_bytes)
            .map_err(|e| Self::conversion_error(0, Type::Blob, e))?;

        let role_str: String = row.get(1)?;
        let role = Role::parse(&role_str).ok_or_else(|| {
            Self::conversion_error(
                1,
                Type::Text,
                StoreError::InvalidData(format!("Unknown role: {}", role_str)),
            )
        })?;

        let landmark_json: Option<String> = row.get(4)?;
        let landmark = landmark_json
            .map(|json| serde_json::from_str::<Landmark>(&json))
            .transpose()
            .map_err(|e| Self::conversion_error(4, Type::Text, e.into()))?;

        Ok(TurnRecord {
            id,
            role,
            text: row.get(2)?,
            location: row.get(3)?,
            landmark,
            aborted: row.get::<_, i64>(5)? != 0,
            created_at: row.get::<_, i64>(6)? as u64,
        })
    }

    fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
        Ok(Chat {
            id: ChatId::from_string(row.get::<_, String>(0)?),
            title: row.get(1)?,
            path: row.get(2)?,
            created_at: row.get::<_, i64>(3)? as u64,
            messages: Vec::new(),
        })
    }
}

impl TurnStore for SqliteStore {
    type Error = StoreError;

    fn save_turn(&mut self, chat_id: &ChatId, record: &TurnRecord) -> Result<(), Self::Error> {
        let id_bytes = Self::message_id_to_bytes(record.id);

        let exists: bool = self
            .conn
            .query_row("SELECT 1 FROM turns WHERE id = ?1", params![&id_bytes], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if exists {
            return Err(StoreError::Duplicate(record.id.to_string()));
        }

        let landmark = record
            .landmark
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            "INSERT INTO turns (id, chat_id, role, text, location, landmark, aborted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &id_bytes,
                chat_id.as_str(),
                record.role.as_str(),
                &record.text,
                &record.location,
                landmark,
                record.aborted as i64,
                record.created_at as i64,
            ],
        )?;

        Ok(())
    }

    fn load_turns(&self, chat_id: &ChatId) -> Result<Vec<TurnRecord>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, role, text, location, landmark, aborted, created_at
             FROM turns WHERE chat_id = ?1 ORDER BY rowid",
        )?;

        let records = stmt
            .query_map(params![chat_id.as_str()], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl ChatStore for SqliteStore {
    fn save_chat(&mut self, chat: &Chat) -> Result<(), Self::Error> {
        self.conn.execute(
            "INSERT INTO chats (id, title, path, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title, path = excluded.path",
            params![
                chat.id.as_str(),
                &chat.title,
                &chat.path,
                chat.created_at as i64,
            ],
        )?;
        Ok(())
    }

    fn load_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>, Self::Error> {
        let chat = self
            .conn
            .query_row(
                "SELECT id, title, path, created_at FROM chats WHERE id = ?1",
                params![chat_id.as_str()],
                Self::row_to_chat,
            )
            .optional()?;

        match chat {
            Some(mut chat) => {
                chat.messages = self.load_turns(chat_id)?;
                Ok(Some(chat))
            }
            None => Ok(None),
        }
    }

    fn list_chats(&self) -> Result<Vec<Chat>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, path, created_at FROM chats ORDER BY created_at DESC, rowid DESC",
        )?;
        let chats = stmt
            .query_map([], Self::row_to_chat)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(chats)
    }
}
