//! Storage traits and error types
//!
//! Everything durable (search results, catalogs, progress documents, the
//! task registry) is a JSON document behind a string key. Backends only
//! have to provide whole-document put/get; a `put` fully replaces the
//! previous value and is never visible half-written.

use crate::state::ProgressState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable key-value document store
///
/// Implementations must be safe to share between tasks; callers hold them
/// behind an `Arc<dyn Store>`.
pub trait Store: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value atomically
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Returns the value stored under `key`, if any
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Returns all keys starting with `prefix`, sorted
    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Typed JSON helpers for any [`Store`]
pub trait StoreExt {
    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()>;

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>>;
}

impl<S: Store + ?Sized> StoreExt for S {
    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let json = serde_json::to_string(value)?;
        self.put(key, &json)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

/// Publishes progress documents for external pollers
///
/// The acquisition core depends only on this capability, never on where
/// the document ends up.
pub trait ProgressPublisher: Send + Sync {
    /// Replaces the persisted progress document of `state.task_id`
    fn publish(&self, state: &ProgressState) -> StorageResult<()>;

    /// Loads the latest progress document of a task
    fn load_progress(&self, task_id: &str) -> StorageResult<Option<ProgressState>>;
}

impl<S: Store + ?Sized> ProgressPublisher for S {
    fn publish(&self, state: &ProgressState) -> StorageResult<()> {
        self.put_json(&progress_key(&state.task_id), state)
    }

    fn load_progress(&self, task_id: &str) -> StorageResult<Option<ProgressState>> {
        self.get_json(&progress_key(task_id))
    }
}

// ===== Key Layout =====

pub const PROGRESS_PREFIX: &str = "progress_";
pub const SEARCH_PREFIX: &str = "search_";
pub const CATALOG_PREFIX: &str = "catalog_";
pub const TASK_PREFIX: &str = "task_";
pub const NOVEL_PREFIX: &str = "novel_";

/// Key of a task's progress document
pub fn progress_key(task_id: &str) -> String {
    format!("{}{}", PROGRESS_PREFIX, task_id)
}

/// Key of the cached search result for a keyword
pub fn search_key(keyword: &str) -> String {
    format!("{}{}", SEARCH_PREFIX, short_digest(keyword))
}

/// Key of the stored catalog for a book name
pub fn catalog_key(book: &str) -> String {
    format!("{}{}", CATALOG_PREFIX, short_digest(book))
}

/// Key of the cached catalog of one novel page, whatever book name it is stored under
pub fn novel_key(novel_path: &str) -> String {
    format!("{}{}", NOVEL_PREFIX, short_digest(novel_path))
}

/// Key of a task registry entry
pub fn task_key(task_id: &str) -> String {
    format!("{}{}", TASK_PREFIX, task_id)
}

/// First 16 hex chars of the SHA-256 of `input`
///
/// Keeps keys filesystem-safe whatever script the book name is in.
pub fn short_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.trim().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}
