//! Durable key-value storage for users, the session pointer, and notes.
//!
//! Every record the core persists lives under one of three fixed keys as a
//! UTF-8 JSON document:
//!
//! | Key | Value |
//! |-----|-------|
//! | [`USERS_KEY`] | JSON array of every registered [`User`](crate::User) |
//! | [`CURRENT_USER_KEY`] | JSON object of the signed-in user, absent when signed out |
//! | [`NOTES_KEY`] | JSON array of every [`Note`](crate::Note) across all users |
//!
//! Components talk to the medium only through [`KeyValueStore`]. Two backends
//! ship with the crate: [`SqliteStore`] for on-disk persistence and
//! [`MemoryStore`](crate::MemoryStore) for tests and throwaway sessions.

use crate::{JotbookError, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Key holding the full registered-user set.
pub const USERS_KEY: &str = "users";
/// Key holding the current-user pointer.
pub const CURRENT_USER_KEY: &str = "user";
/// Key holding the flat note set of all users.
pub const NOTES_KEY: &str = "notes";

/// Async interface to a byte-string store addressed by string keys.
///
/// Implementations must make each `set` atomic: a reader sees either the old
/// value or the new one, never a mix.
pub trait KeyValueStore {
    /// Reads the value at `key`, or `None` if nothing is stored there.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Overwrites the value at `key`.
    fn set(&self, key: &str, value: Vec<u8>) -> impl Future<Output = Result<()>> + Send;

    /// Deletes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Reads and deserializes the JSON document stored at `key`.
///
/// # Errors
///
/// Returns [`JotbookError::Json`] if the stored bytes are not valid JSON for `T`,
/// or whatever error the backend reports.
pub async fn read_json<S, T>(store: &S, key: &str) -> Result<Option<T>>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Serializes `value` as JSON and stores it at `key`.
///
/// # Errors
///
/// Returns [`JotbookError::Json`] if `value` cannot be serialized, or whatever
/// error the backend reports.
pub async fn write_json<S, T>(store: &S, key: &str, value: &T) -> Result<()>
where
    S: KeyValueStore,
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec(value)?;
    store.set(key, bytes).await
}

/// SQLite-backed [`KeyValueStore`] holding every key in a single `kv_store` table.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the store at `path` and makes sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::Database`] if the file cannot be opened or is not
    /// a SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens a private in-memory database, discarded when the last clone drops.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::Database`] if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| JotbookError::Storage("SQLite connection lock poisoned".to_string()))
    }
}

impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.connection()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                [key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(())
    }
}
