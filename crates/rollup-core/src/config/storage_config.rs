//! Storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file. `None` opens an in-memory database.
    pub db_path: Option<PathBuf>,
}
