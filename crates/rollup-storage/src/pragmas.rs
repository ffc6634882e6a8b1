//! SQLite PRAGMA configuration. Applied to every connection right after opening.

use rusqlite::Connection;
use rollup_core::StorageError;

use crate::sqe;

/// WAL for concurrent readers, busy_timeout as the lock-contention mechanism.
pub fn configure_connection(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        PRAGMA temp_store = MEMORY;
        ",
    )
    .map_err(sqe)
}
