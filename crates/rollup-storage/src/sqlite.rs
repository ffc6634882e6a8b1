//! `SqliteRollupStore`: the `RollupStore` over a single SQLite connection.
//!
//! Every row carries its full JSON body next to the indexed scalar columns,
//! so the stored shape follows the wire format of the models. All access goes
//! through `with_conn`; nothing outside this module touches the connection.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use rollup_core::errors::{ENTITY_CONFIGURATION, ENTITY_EXECUTION, ENTITY_MERGED_GRAPH};
use rollup_core::models::{
    ConfigurationFilter, MatchResult, MergedGraph, RollupConfiguration, RollupExecution,
};
use rollup_core::{RollupStore, StorageError};

use crate::{migrations, pragmas, sqe};

pub struct SqliteRollupStore {
    conn: Mutex<Connection>,
}

impl SqliteRollupStore {
    /// Open (or create) a database file and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(sqe)?;
        info!(path = %path.display(), "opened rollup database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory().map_err(sqe)?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        pragmas::configure_connection(&conn)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<u32, StorageError> {
        self.with_conn(migrations::current_version)
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self.conn.lock().map_err(|e| StorageError::SqliteError {
            message: format!("connection lock poisoned: {e}"),
        })?;
        f(&conn)
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, StorageError> {
    serde_json::from_str(body).map_err(|e| StorageError::Corrupt {
        message: e.to_string(),
    })
}

fn exists(conn: &Connection, sql: &str, id: &str) -> Result<bool, StorageError> {
    conn.prepare(sql)
        .and_then(|mut stmt| stmt.exists([id]))
        .map_err(sqe)
}

fn load_body(conn: &Connection, sql: &str, id: &str) -> Result<Option<String>, StorageError> {
    conn.query_row(sql, [id], |row| row.get(0))
        .optional()
        .map_err(sqe)
}

fn next_seq(conn: &Connection, table: &str) -> Result<i64, StorageError> {
    conn.query_row(
        &format!("SELECT COALESCE(MAX(seq), 0) + 1 FROM {table}"),
        [],
        |row| row.get(0),
    )
    .map_err(sqe)
}

fn read_execution(conn: &Connection, id: &str) -> Result<Option<RollupExecution>, StorageError> {
    load_body(conn, "SELECT body FROM rollup_executions WHERE id = ?1", id)?
        .map(|body| decode(&body))
        .transpose()
}

fn write_execution(conn: &Connection, execution: &RollupExecution) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE rollup_executions SET status = ?2, body = ?3 WHERE id = ?1",
        params![execution.id, execution.status.as_str(), encode(execution)?],
    )
    .map_err(sqe)?;
    Ok(())
}

fn require_execution(conn: &Connection, execution_id: &str) -> Result<(), StorageError> {
    if exists(conn, "SELECT 1 FROM rollup_executions WHERE id = ?1", execution_id)? {
        Ok(())
    } else {
        Err(StorageError::not_found(ENTITY_EXECUTION, execution_id))
    }
}

impl RollupStore for SqliteRollupStore {
    fn insert_configuration(&self, config: &RollupConfiguration) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            if exists(conn, "SELECT 1 FROM rollup_configurations WHERE id = ?1", &config.id)? {
                return Err(StorageError::AlreadyExists {
                    entity: ENTITY_CONFIGURATION,
                    id: config.id.clone(),
                });
            }
            conn.execute(
                "INSERT INTO rollup_configurations
                    (id, tenant_id, status, version, created_at, seq, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    config.id,
                    config.tenant_id,
                    config.status.as_str(),
                    config.version as i64,
                    config.created_at.to_rfc3339(),
                    next_seq(conn, "rollup_configurations")?,
                    encode(config)?,
                ],
            )
            .map_err(sqe)?;
            debug!(rollup_id = %config.id, "inserted configuration");
            Ok(())
        })
    }

    fn get_configuration(&self, id: &str) -> Result<Option<RollupConfiguration>, StorageError> {
        self.with_conn(|conn| {
            load_body(conn, "SELECT body FROM rollup_configurations WHERE id = ?1", id)?
                .map(|body| decode(&body))
                .transpose()
        })
    }

    fn update_configuration(
        &self,
        config: &RollupConfiguration,
        expected_version: u64,
    ) -> Result<RollupConfiguration, StorageError> {
        self.with_conn(|conn| {
            let current: Option<i64> = conn
                .query_row(
                    "SELECT version FROM rollup_configurations WHERE id = ?1",
                    [&config.id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sqe)?;
            let current = current
                .ok_or_else(|| StorageError::not_found(ENTITY_CONFIGURATION, &config.id))?
                as u64;

            let mut stored = config.clone();
            stored.version = expected_version + 1;
            let changed = conn
                .execute(
                    "UPDATE rollup_configurations
                     SET tenant_id = ?2, status = ?3, version = ?4, body = ?5
                     WHERE id = ?1 AND version = ?6",
                    params![
                        stored.id,
                        stored.tenant_id,
                        stored.status.as_str(),
                        stored.version as i64,
                        encode(&stored)?,
                        expected_version as i64,
                    ],
                )
                .map_err(sqe)?;
            if changed == 0 {
                return Err(StorageError::VersionConflict {
                    id: config.id.clone(),
                    expected: expected_version,
                    current,
                });
            }
            Ok(stored)
        })
    }

    fn list_configurations(
        &self,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<RollupConfiguration>, StorageError> {
        self.with_conn(|conn| {
            let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
            let mut stmt = conn
                .prepare(
                    "SELECT body FROM rollup_configurations
                     WHERE (?1 IS NULL OR tenant_id = ?1)
                       AND (?2 IS NULL OR status = ?2)
                     ORDER BY seq ASC
                     LIMIT ?3 OFFSET ?4",
                )
                .map_err(sqe)?;
            let bodies = stmt
                .query_map(
                    params![
                        filter.tenant_id,
                        filter.status.map(|s| s.as_str()),
                        limit,
                        filter.offset as i64,
                    ],
                    |row| row.get::<_, String>(0),
                )
                .map_err(sqe)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sqe)?;
            bodies.iter().map(|body| decode(body)).collect()
        })
    }

    fn delete_configuration(&self, id: &str) -> Result<bool, StorageError> {
        self.with_conn(|conn| {
            let deleted = conn
                .execute("DELETE FROM rollup_configurations WHERE id = ?1", [id])
                .map_err(sqe)?;
            if deleted > 0 {
                debug!(rollup_id = %id, "deleted configuration and its executions");
            }
            Ok(deleted > 0)
        })
    }

    fn insert_execution(&self, execution: &RollupExecution) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            if !exists(
                conn,
                "SELECT 1 FROM rollup_configurations WHERE id = ?1",
                &execution.rollup_id,
            )? {
                return Err(StorageError::not_found(
                    ENTITY_CONFIGURATION,
                    &execution.rollup_id,
                ));
            }
            if exists(conn, "SELECT 1 FROM rollup_executions WHERE id = ?1", &execution.id)? {
                return Err(StorageError::AlreadyExists {
                    entity: ENTITY_EXECUTION,
                    id: execution.id.clone(),
                });
            }
            conn.execute(
                "INSERT INTO rollup_executions (id, rollup_id, status, created_at, seq, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    execution.id,
                    execution.rollup_id,
                    execution.status.as_str(),
                    execution.created_at.to_rfc3339(),
                    next_seq(conn, "rollup_executions")?,
                    encode(execution)?,
                ],
            )
            .map_err(sqe)?;
            Ok(())
        })
    }

    fn get_execution(&self, id: &str) -> Result<Option<RollupExecution>, StorageError> {
        self.with_conn(|conn| read_execution(conn, id))
    }

    fn update_execution(&self, execution: &RollupExecution) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let stored = read_execution(conn, &execution.id)?
                .ok_or_else(|| StorageError::not_found(ENTITY_EXECUTION, &execution.id))?;
            if stored.is_terminal() {
                return Err(StorageError::Immutable {
                    entity: ENTITY_EXECUTION,
                    id: execution.id.clone(),
                });
            }
            write_execution(conn, execution)
        })
    }

    fn link_retry(&self, previous_id: &str, next_id: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let mut previous = read_execution(conn, previous_id)?
                .ok_or_else(|| StorageError::not_found(ENTITY_EXECUTION, previous_id))?;
            require_execution(conn, next_id)?;
            previous.retried_by = Some(next_id.to_string());
            write_execution(conn, &previous)
        })
    }

    fn list_executions(
        &self,
        rollup_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RollupExecution>, StorageError> {
        self.with_conn(|conn| {
            let limit = limit.map(|l| l as i64).unwrap_or(-1);
            let mut stmt = conn
                .prepare(
                    "SELECT body FROM rollup_executions
                     WHERE rollup_id = ?1
                     ORDER BY seq DESC
                     LIMIT ?2",
                )
                .map_err(sqe)?;
            let bodies = stmt
                .query_map(params![rollup_id, limit], |row| row.get::<_, String>(0))
                .map_err(sqe)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sqe)?;
            bodies.iter().map(|body| decode(body)).collect()
        })
    }

    fn save_merged_graph(
        &self,
        execution_id: &str,
        graph: &MergedGraph,
    ) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            require_execution(conn, execution_id)?;
            conn.execute(
                "INSERT OR REPLACE INTO rollup_merged_graphs (execution_id, body) VALUES (?1, ?2)",
                params![execution_id, encode(graph)?],
            )
            .map_err(sqe)?;
            debug!(
                execution_id,
                nodes = graph.node_count(),
                edges = graph.edges.len(),
                "saved {}",
                ENTITY_MERGED_GRAPH
            );
            Ok(())
        })
    }

    fn load_merged_graph(&self, execution_id: &str) -> Result<Option<MergedGraph>, StorageError> {
        self.with_conn(|conn| {
            load_body(
                conn,
                "SELECT body FROM rollup_merged_graphs WHERE execution_id = ?1",
                execution_id,
            )?
            .map(|body| decode(&body))
            .transpose()
        })
    }

    fn save_match_results(
        &self,
        execution_id: &str,
        matches: &[MatchResult],
    ) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            require_execution(conn, execution_id)?;
            conn.execute(
                "INSERT OR REPLACE INTO rollup_match_results (execution_id, body) VALUES (?1, ?2)",
                params![execution_id, encode(matches)?],
            )
            .map_err(sqe)?;
            Ok(())
        })
    }

    fn load_match_results(&self, execution_id: &str) -> Result<Vec<MatchResult>, StorageError> {
        self.with_conn(|conn| {
            load_body(
                conn,
                "SELECT body FROM rollup_match_results WHERE execution_id = ?1",
                execution_id,
            )?
            .map(|body| decode(&body))
            .transpose()
            .map(Option::unwrap_or_default)
        })
    }
}
