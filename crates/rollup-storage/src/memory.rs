//! `InMemoryRollupStore`: the `RollupStore` contract over plain maps.
//!
//! Same ordering, versioning and immutability rules as the SQLite store.

use std::sync::{Mutex, MutexGuard};

use rustc_hash::FxHashMap;

use rollup_core::errors::{ENTITY_CONFIGURATION, ENTITY_EXECUTION};
use rollup_core::models::{
    ConfigurationFilter, MatchResult, MergedGraph, RollupConfiguration, RollupExecution,
};
use rollup_core::{RollupStore, StorageError};

#[derive(Default)]
struct Tables {
    seq: u64,
    configurations: FxHashMap<String, (u64, RollupConfiguration)>,
    executions: FxHashMap<String, (u64, RollupExecution)>,
    merged_graphs: FxHashMap<String, MergedGraph>,
    match_results: FxHashMap<String, Vec<MatchResult>>,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn execution_mut(&mut self, id: &str) -> Result<&mut RollupExecution, StorageError> {
        self.executions
            .get_mut(id)
            .map(|(_, e)| e)
            .ok_or_else(|| StorageError::not_found(ENTITY_EXECUTION, id))
    }

    fn require_execution(&self, id: &str) -> Result<(), StorageError> {
        if self.executions.contains_key(id) {
            Ok(())
        } else {
            Err(StorageError::not_found(ENTITY_EXECUTION, id))
        }
    }
}

#[derive(Default)]
pub struct InMemoryRollupStore {
    tables: Mutex<Tables>,
}

impl InMemoryRollupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables.lock().map_err(|e| StorageError::SqliteError {
            message: format!("store lock poisoned: {e}"),
        })
    }
}

impl RollupStore for InMemoryRollupStore {
    fn insert_configuration(&self, config: &RollupConfiguration) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        if tables.configurations.contains_key(&config.id) {
            return Err(StorageError::AlreadyExists {
                entity: ENTITY_CONFIGURATION,
                id: config.id.clone(),
            });
        }
        let seq = tables.next_seq();
        tables
            .configurations
            .insert(config.id.clone(), (seq, config.clone()));
        Ok(())
    }

    fn get_configuration(&self, id: &str) -> Result<Option<RollupConfiguration>, StorageError> {
        Ok(self.lock()?.configurations.get(id).map(|(_, c)| c.clone()))
    }

    fn update_configuration(
        &self,
        config: &RollupConfiguration,
        expected_version: u64,
    ) -> Result<RollupConfiguration, StorageError> {
        let mut tables = self.lock()?;
        let (_, current) = tables
            .configurations
            .get_mut(&config.id)
            .ok_or_else(|| StorageError::not_found(ENTITY_CONFIGURATION, &config.id))?;
        if current.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: config.id.clone(),
                expected: expected_version,
                current: current.version,
            });
        }
        let mut stored = config.clone();
        stored.version = expected_version + 1;
        *current = stored.clone();
        Ok(stored)
    }

    fn list_configurations(
        &self,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<RollupConfiguration>, StorageError> {
        let tables = self.lock()?;
        let mut rows: Vec<&(u64, RollupConfiguration)> = tables
            .configurations
            .values()
            .filter(|(_, c)| filter.matches(c))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|(_, c)| c.clone())
            .collect())
    }

    fn delete_configuration(&self, id: &str) -> Result<bool, StorageError> {
        let mut tables = self.lock()?;
        if tables.configurations.remove(id).is_none() {
            return Ok(false);
        }
        let execution_ids: Vec<String> = tables
            .executions
            .iter()
            .filter(|(_, (_, e))| e.rollup_id == id)
            .map(|(eid, _)| eid.clone())
            .collect();
        for eid in execution_ids {
            tables.executions.remove(&eid);
            tables.merged_graphs.remove(&eid);
            tables.match_results.remove(&eid);
        }
        Ok(true)
    }

    fn insert_execution(&self, execution: &RollupExecution) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        if !tables.configurations.contains_key(&execution.rollup_id) {
            return Err(StorageError::not_found(
                ENTITY_CONFIGURATION,
                &execution.rollup_id,
            ));
        }
        if tables.executions.contains_key(&execution.id) {
            return Err(StorageError::AlreadyExists {
                entity: ENTITY_EXECUTION,
                id: execution.id.clone(),
            });
        }
        let seq = tables.next_seq();
        tables
            .executions
            .insert(execution.id.clone(), (seq, execution.clone()));
        Ok(())
    }

    fn get_execution(&self, id: &str) -> Result<Option<RollupExecution>, StorageError> {
        Ok(self.lock()?.executions.get(id).map(|(_, e)| e.clone()))
    }

    fn update_execution(&self, execution: &RollupExecution) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        let stored = tables.execution_mut(&execution.id)?;
        if stored.is_terminal() {
            return Err(StorageError::Immutable {
                entity: ENTITY_EXECUTION,
                id: execution.id.clone(),
            });
        }
        *stored = execution.clone();
        Ok(())
    }

    fn link_retry(&self, previous_id: &str, next_id: &str) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.require_execution(next_id)?;
        tables.execution_mut(previous_id)?.retried_by = Some(next_id.to_string());
        Ok(())
    }

    fn list_executions(
        &self,
        rollup_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RollupExecution>, StorageError> {
        let tables = self.lock()?;
        let mut rows: Vec<&(u64, RollupExecution)> = tables
            .executions
            .values()
            .filter(|(_, e)| e.rollup_id == rollup_id)
            .collect();
        rows.sort_by_key(|(seq, _)| std::cmp::Reverse(*seq));
        Ok(rows
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, e)| e.clone())
            .collect())
    }

    fn save_merged_graph(
        &self,
        execution_id: &str,
        graph: &MergedGraph,
    ) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.require_execution(execution_id)?;
        tables
            .merged_graphs
            .insert(execution_id.to_string(), graph.clone());
        Ok(())
    }

    fn load_merged_graph(&self, execution_id: &str) -> Result<Option<MergedGraph>, StorageError> {
        Ok(self.lock()?.merged_graphs.get(execution_id).cloned())
    }

    fn save_match_results(
        &self,
        execution_id: &str,
        matches: &[MatchResult],
    ) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.require_execution(execution_id)?;
        tables
            .match_results
            .insert(execution_id.to_string(), matches.to_vec());
        Ok(())
    }

    fn load_match_results(&self, execution_id: &str) -> Result<Vec<MatchResult>, StorageError> {
        Ok(self
            .lock()?
            .match_results
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }
}
