//! `RollupStore` trait: persistence of configurations, executions and
//! execution artifacts.
//!
//! Implemented by the SQLite and in-memory stores in `rollup-storage`.
//! Object-safe, `Send + Sync`, with a blanket `Arc<T>` impl.

use std::sync::Arc;

use crate::errors::StorageError;
use crate::models::{
    ConfigurationFilter, MatchResult, MergedGraph, RollupConfiguration, RollupExecution,
};

pub trait RollupStore: Send + Sync {
    // ── Configurations ──

    /// Insert a new configuration. Fails with `AlreadyExists` on id collision.
    fn insert_configuration(&self, config: &RollupConfiguration) -> Result<(), StorageError>;

    fn get_configuration(&self, id: &str) -> Result<Option<RollupConfiguration>, StorageError>;

    /// Replace a configuration if its stored version equals `expected_version`.
    /// The stored copy gets `version = expected_version + 1` and is returned.
    fn update_configuration(
        &self,
        config: &RollupConfiguration,
        expected_version: u64,
    ) -> Result<RollupConfiguration, StorageError>;

    /// Configurations matching `filter`, oldest first.
    fn list_configurations(
        &self,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<RollupConfiguration>, StorageError>;

    /// Delete a configuration with all of its executions and artifacts.
    /// Returns false when it did not exist.
    fn delete_configuration(&self, id: &str) -> Result<bool, StorageError>;

    // ── Executions ──

    fn insert_execution(&self, execution: &RollupExecution) -> Result<(), StorageError>;

    fn get_execution(&self, id: &str) -> Result<Option<RollupExecution>, StorageError>;

    /// Replace a non-terminal execution. Stored terminal executions are `Immutable`.
    fn update_execution(&self, execution: &RollupExecution) -> Result<(), StorageError>;

    /// Record that `next_id` retries the terminal execution `previous_id`.
    fn link_retry(&self, previous_id: &str, next_id: &str) -> Result<(), StorageError>;

    /// Executions of one configuration, newest first.
    fn list_executions(
        &self,
        rollup_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RollupExecution>, StorageError>;

    // ── Artifacts ──

    fn save_merged_graph(&self, execution_id: &str, graph: &MergedGraph)
        -> Result<(), StorageError>;

    fn load_merged_graph(&self, execution_id: &str) -> Result<Option<MergedGraph>, StorageError>;

    fn save_match_results(
        &self,
        execution_id: &str,
        matches: &[MatchResult],
    ) -> Result<(), StorageError>;

    fn load_match_results(&self, execution_id: &str) -> Result<Vec<MatchResult>, StorageError>;
}

// ─── Arc blanket impl ───────────────────────────────────────────────

impl<T: RollupStore + ?Sized> RollupStore for Arc<T> {
    fn insert_configuration(&self, config: &RollupConfiguration) -> Result<(), StorageError> {
        (**self).insert_configuration(config)
    }
    fn get_configuration(&self, id: &str) -> Result<Option<RollupConfiguration>, StorageError> {
        (**self).get_configuration(id)
    }
    fn update_configuration(
        &self,
        config: &RollupConfiguration,
        expected_version: u64,
    ) -> Result<RollupConfiguration, StorageError> {
        (**self).update_configuration(config, expected_version)
    }
    fn list_configurations(
        &self,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<RollupConfiguration>, StorageError> {
        (**self).list_configurations(filter)
    }
    fn delete_configuration(&self, id: &str) -> Result<bool, StorageError> {
        (**self).delete_configuration(id)
    }
    fn insert_execution(&self, execution: &RollupExecution) -> Result<(), StorageError> {
        (**self).insert_execution(execution)
    }
    fn get_execution(&self, id: &str) -> Result<Option<RollupExecution>, StorageError> {
        (**self).get_execution(id)
    }
    fn update_execution(&self, execution: &RollupExecution) -> Result<(), StorageError> {
        (**self).update_execution(execution)
    }
    fn link_retry(&self, previous_id: &str, next_id: &str) -> Result<(), StorageError> {
        (**self).link_retry(previous_id, next_id)
    }
    fn list_executions(
        &self,
        rollup_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RollupExecution>, StorageError> {
        (**self).list_executions(rollup_id, limit)
    }
    fn save_merged_graph(
        &self,
        execution_id: &str,
        graph: &MergedGraph,
    ) -> Result<(), StorageError> {
        (**self).save_merged_graph(execution_id, graph)
    }
    fn load_merged_graph(&self, execution_id: &str) -> Result<Option<MergedGraph>, StorageError> {
        (**self).load_merged_graph(execution_id)
    }
    fn save_match_results(
        &self,
        execution_id: &str,
        matches: &[MatchResult],
    ) -> Result<(), StorageError> {
        (**self).save_match_results(execution_id, matches)
    }
    fn load_match_results(&self, execution_id: &str) -> Result<Vec<MatchResult>, StorageError> {
        (**self).load_match_results(execution_id)
    }
}
