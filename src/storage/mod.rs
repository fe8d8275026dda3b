//! Storage module for persisting acquisition data
//!
//! This module handles every durable document the harvester keeps:
//! - Cached search results and catalogs
//! - Progress documents polled by external observers
//! - The task registry
//!
//! Two backends implement [`Store`]: SQLite (default) and a directory of
//! JSON files.

mod files;
mod schema;
mod sqlite;
mod traits;

pub use files::FileStore;
pub use sqlite::SqliteStore;
pub use traits::{
    catalog_key, novel_key, progress_key, search_key, short_digest, task_key, ProgressPublisher,
    Store, StoreExt, StorageError, StorageResult, CATALOG_PREFIX, NOVEL_PREFIX, PROGRESS_PREFIX,
    SEARCH_PREFIX, TASK_PREFIX,
};

use crate::config::{OutputConfig, StoreKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Opens the store selected by the `[output]` config section
///
/// # Arguments
///
/// * `config` - Output configuration (store kind, database path, directory)
///
/// # Returns
///
/// * `Ok(Arc<dyn Store>)` - Shared store handle
/// * `Err(StorageError)` - Failed to open the backend
pub fn open_store(config: &OutputConfig) -> StorageResult<Arc<dyn Store>> {
    match config.store {
        StoreKind::Sqlite => Ok(Arc::new(SqliteStore::new(Path::new(&config.database_path))?)),
        StoreKind::Files => Ok(Arc::new(FileStore::new(&config.directory)?)),
    }
}

/// Registry entry describing one download job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub book: String,
    pub start: i64,
    pub end: i64,
    pub format: String,
    pub output_path: String,
    pub started_at: String,
}

/// Lists every registered task, oldest first
pub fn list_tasks(store: &dyn Store) -> StorageResult<Vec<TaskRecord>> {
    let mut tasks = Vec::new();
    for key in store.keys_with_prefix(TASK_PREFIX)? {
        if let Some(task) = store.get_json::<TaskRecord>(&key)? {
            tasks.push(task);
        }
    }
    tasks.sort_by(|a, b| a.started_at.cmp(&b.started_at));
    Ok(tasks)
}
