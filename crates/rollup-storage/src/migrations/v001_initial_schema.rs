//! v001: configurations, executions and execution artifacts.
//!
//! Rows keep the full JSON body; the scalar columns exist for filtering and ordering.

use rusqlite::Connection;
use rollup_core::StorageError;

use crate::sqe;

pub fn migrate(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS rollup_configurations (
            id TEXT PRIMARY KEY NOT NULL,
            tenant_id TEXT NOT NULL,
            status TEXT NOT NULL,
            version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            seq INTEGER NOT NULL,
            body TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rollup_executions (
            id TEXT PRIMARY KEY NOT NULL,
            rollup_id TEXT NOT NULL
                REFERENCES rollup_configurations(id) ON DELETE CASCADE,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            seq INTEGER NOT NULL,
            body TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rollup_merged_graphs (
            execution_id TEXT PRIMARY KEY NOT NULL
                REFERENCES rollup_executions(id) ON DELETE CASCADE,
            body TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rollup_match_results (
            execution_id TEXT PRIMARY KEY NOT NULL
                REFERENCES rollup_executions(id) ON DELETE CASCADE,
            body TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_configurations_tenant
            ON rollup_configurations(tenant_id, status);
        CREATE INDEX IF NOT EXISTS idx_executions_rollup
            ON rollup_executions(rollup_id, seq);
        ",
    )
    .map_err(sqe)
}
