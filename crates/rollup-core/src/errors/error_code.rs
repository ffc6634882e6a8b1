//! Stable error codes surfaced to callers.
//!
//! Codes never change once published; clients branch on them instead of on
//! message text.

/// Every error type in the workspace maps to exactly one stable code.
pub trait RollupErrorCode {
    fn error_code(&self) -> &'static str;
}

// Validation
pub const INVALID_CONFIGURATION: &str = "ROLLUP_INVALID_CONFIGURATION";
pub const INVALID_QUERY: &str = "ROLLUP_INVALID_QUERY";

// Concurrency / state
pub const VERSION_CONFLICT: &str = "ROLLUP_VERSION_CONFLICT";
pub const EXECUTION_IN_PROGRESS: &str = "ROLLUP_EXECUTION_IN_PROGRESS";
pub const EXECUTION_NOT_RUNNING: &str = "ROLLUP_EXECUTION_NOT_RUNNING";
pub const EXECUTION_NOT_COMPLETED: &str = "ROLLUP_EXECUTION_NOT_COMPLETED";
pub const INVALID_STATE_TRANSITION: &str = "ROLLUP_INVALID_STATE_TRANSITION";

// Lookup
pub const CONFIGURATION_NOT_FOUND: &str = "ROLLUP_CONFIGURATION_NOT_FOUND";
pub const EXECUTION_NOT_FOUND: &str = "ROLLUP_EXECUTION_NOT_FOUND";
pub const REPOSITORY_NOT_FOUND: &str = "ROLLUP_REPOSITORY_NOT_FOUND";
pub const SCAN_NOT_FOUND: &str = "ROLLUP_SCAN_NOT_FOUND";
pub const NODE_NOT_FOUND: &str = "ROLLUP_NODE_NOT_FOUND";

// Execution
pub const EXECUTION_TIMEOUT: &str = "ROLLUP_EXECUTION_TIMEOUT";
pub const EXECUTION_CANCELLED: &str = "ROLLUP_EXECUTION_CANCELLED";
pub const MAX_NODES_EXCEEDED: &str = "ROLLUP_MAX_NODES_EXCEEDED";
pub const MERGE_CONFLICT: &str = "ROLLUP_MERGE_CONFLICT";
pub const GRAPH_SOURCE_UNAVAILABLE: &str = "ROLLUP_GRAPH_SOURCE_UNAVAILABLE";

// Infrastructure
pub const STORAGE_ERROR: &str = "ROLLUP_STORAGE_ERROR";
pub const DB_BUSY: &str = "ROLLUP_DB_BUSY";
pub const DB_CORRUPT: &str = "ROLLUP_DB_CORRUPT";
pub const MIGRATION_FAILED: &str = "ROLLUP_MIGRATION_FAILED";
pub const SERIALIZATION_ERROR: &str = "ROLLUP_SERIALIZATION_ERROR";
pub const CONFIG_ERROR: &str = "ROLLUP_CONFIG_ERROR";
pub const INTERNAL_ERROR: &str = "ROLLUP_INTERNAL_ERROR";
