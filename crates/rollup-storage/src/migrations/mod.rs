//! Migration runner: version tracking, forward-only, one transaction per migration.

mod v001_initial_schema;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use rollup_core::StorageError;

use crate::sqe;

pub const LATEST_VERSION: u32 = 1;

type MigrationFn = fn(&Connection) -> Result<(), StorageError>;

const MIGRATIONS: [(u32, &str, MigrationFn); 1] =
    [(1, "initial_schema", v001_initial_schema::migrate)];

/// Current schema version, 0 before the first migration.
pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'")
        .and_then(|mut stmt| stmt.exists([]))
        .map_err(sqe)?;

    if !exists {
        return Ok(0);
    }

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(sqe)
}

/// Apply every pending migration. Returns how many were applied.
pub fn run_migrations(conn: &Connection) -> Result<u32, StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(sqe)?;

    let current = current_version(conn)?;
    if current >= LATEST_VERSION {
        debug!("rollup schema is up to date (v{current})");
        return Ok(0);
    }

    info!("running rollup migrations: v{} → v{}", current, LATEST_VERSION);

    let mut applied = 0;
    for &(version, name, migrate_fn) in &MIGRATIONS {
        if version <= current {
            continue;
        }

        debug!("applying migration v{version:03}: {name}");
        conn.execute_batch("BEGIN IMMEDIATE").map_err(|e| StorageError::MigrationFailed {
            version,
            message: format!("begin transaction: {e}"),
        })?;

        let result = migrate_fn(conn).and_then(|()| {
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
                .map(|_| ())
                .map_err(sqe)
        });

        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT").map_err(|e| StorageError::MigrationFailed {
                    version,
                    message: format!("commit: {e}"),
                })?;
                info!("applied migration v{version:03}: {name}");
                applied += 1;
            }
            Err(e) => {
                warn!("migration v{version:03} failed: {e}, rolling back");
                let _ = conn.execute_batch("ROLLBACK");
                return Err(StorageError::MigrationFailed {
                    version,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_migrates_to_latest() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);
        assert_eq!(run_migrations(&conn).unwrap(), LATEST_VERSION);
        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }

    #[test]
    fn second_run_is_a_noop() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), 0);
    }
}
