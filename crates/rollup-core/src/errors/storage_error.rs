//! Storage-layer errors.

use super::error_code::{self, RollupErrorCode};

pub const ENTITY_CONFIGURATION: &str = "rollup_configuration";
pub const ENTITY_EXECUTION: &str = "rollup_execution";
pub const ENTITY_MERGED_GRAPH: &str = "merged_graph";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("Migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("Database busy (another operation in progress)")]
    DbBusy,

    #[error("Database corrupt: {details}")]
    DbCorrupt { details: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("version conflict on {id}: expected {expected}, current {current}")]
    VersionConflict {
        id: String,
        expected: u64,
        current: u64,
    },

    #[error("{entity} {id} is terminal and can no longer change")]
    Immutable { entity: &'static str, id: String },

    #[error("Stored payload could not be decoded: {message}")]
    Corrupt { message: String },
}

impl StorageError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl RollupErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DbBusy => error_code::DB_BUSY,
            Self::DbCorrupt { .. } => error_code::DB_CORRUPT,
            Self::MigrationFailed { .. } => error_code::MIGRATION_FAILED,
            Self::VersionConflict { .. } => error_code::VERSION_CONFLICT,
            Self::NotFound { entity, .. } if *entity == ENTITY_CONFIGURATION => {
                error_code::CONFIGURATION_NOT_FOUND
            }
            Self::NotFound { entity, .. } if *entity == ENTITY_EXECUTION => {
                error_code::EXECUTION_NOT_FOUND
            }
            _ => error_code::STORAGE_ERROR,
        }
    }
}
