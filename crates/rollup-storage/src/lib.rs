//! # rollup-storage
//!
//! Persistence for the rollup engine: a SQLite-backed [`SqliteRollupStore`]
//! with forward-only migrations, an [`InMemoryRollupStore`] with identical
//! semantics, and an [`InMemoryGraphSource`] for feeding scanned graphs.

pub mod graph_source;
pub mod memory;
pub mod migrations;
pub mod pragmas;
pub mod sqlite;

use std::sync::Arc;

use rollup_core::config::StorageConfig;
use rollup_core::{RollupStore, StorageError};

pub use graph_source::InMemoryGraphSource;
pub use memory::InMemoryRollupStore;
pub use sqlite::SqliteRollupStore;

/// Map any SQLite or codec error into a `StorageError`.
pub(crate) fn sqe(e: impl std::fmt::Display) -> StorageError {
    StorageError::SqliteError {
        message: e.to_string(),
    }
}

/// Open the store described by `config`: a file-backed SQLite store when a
/// path is configured, otherwise an in-memory SQLite database.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn RollupStore>, StorageError> {
    let store = match &config.db_path {
        Some(path) => SqliteRollupStore::open(path)?,
        None => SqliteRollupStore::open_in_memory()?,
    };
    Ok(Arc::new(store))
}
