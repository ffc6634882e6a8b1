//! `RollupService`: the operations the rollup subsystem exposes, bound to a
//! store, a graph source and an event publisher.

use std::sync::Arc;

use chrono::Utc;
use rollup_core::events::{
    ConfigurationCreatedEvent, ConfigurationDeletedEvent, ConfigurationUpdatedEvent,
};
use rollup_core::models::{
    BlastRadiusQuery, BlastRadiusResult, ConfigurationFilter, CreateRollupInput,
    ExecuteOverrides, ExecutionHandle, ExecutionStatus, MatchResult, RollupConfiguration,
    RollupExecution, RollupStatus, UpdateRollupInput,
};
use rollup_core::{
    EventEnvelope, EventPayload, EventPublisher, GraphSource, RollupEngineConfig, RollupError,
    RollupResult, RollupStore, StorageError,
};
use tracing::info;

use crate::blast_radius::BlastRadiusEngine;
use crate::executor::RollupExecutor;
use crate::scheduling::should_trigger_on_scan;
use crate::validation::{validate_configuration, validate_overrides};

pub struct RollupService {
    store: Arc<dyn RollupStore>,
    publisher: Arc<dyn EventPublisher>,
    executor: Arc<RollupExecutor>,
    blast_radius: BlastRadiusEngine,
}

impl RollupService {
    pub fn new(
        config: &RollupEngineConfig,
        store: Arc<dyn RollupStore>,
        graph_source: Arc<dyn GraphSource>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let executor = Arc::new(RollupExecutor::new(
            Arc::clone(&store),
            graph_source,
            Arc::clone(&publisher),
            config.executor.clone(),
            config.matching.clone(),
        ));
        Self {
            store,
            publisher,
            executor,
            blast_radius: BlastRadiusEngine::new(&config.blast_radius),
        }
    }

    pub fn executor(&self) -> &Arc<RollupExecutor> {
        &self.executor
    }

    pub fn blast_radius_engine(&self) -> &BlastRadiusEngine {
        &self.blast_radius
    }

    fn publish(&self, tenant_id: &str, actor: Option<String>, payload: EventPayload) {
        let envelope = EventEnvelope::new(tenant_id, payload).with_triggered_by(actor);
        self.publisher.publish(&envelope);
    }

    // ── Configurations ──

    pub fn create_configuration(
        &self,
        tenant_id: &str,
        created_by: &str,
        input: CreateRollupInput,
    ) -> RollupResult<RollupConfiguration> {
        let now = Utc::now();
        let config = RollupConfiguration {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: input.name,
            description: input.description,
            status: if input.activate {
                RollupStatus::Active
            } else {
                RollupStatus::Draft
            },
            repository_ids: input.repository_ids,
            scan_ids: input.scan_ids,
            matchers: input.matchers,
            node_type_filter: input.node_type_filter,
            merge_options: input.merge_options,
            schedule: input.schedule,
            version: 1,
            created_by: created_by.to_string(),
            created_at: now,
            updated_by: None,
            updated_at: now,
        };
        validate_configuration(&config)?;
        self.store.insert_configuration(&config)?;
        info!(rollup_id = %config.id, tenant_id, name = %config.name, "rollup configuration created");
        self.publish(
            tenant_id,
            Some(created_by.to_string()),
            EventPayload::ConfigurationCreated(ConfigurationCreatedEvent {
                rollup_id: config.id.clone(),
                name: config.name.clone(),
                version: config.version,
            }),
        );
        Ok(config)
    }

    pub fn get_configuration(&self, id: &str) -> RollupResult<RollupConfiguration> {
        self.store
            .get_configuration(id)?
            .ok_or_else(|| RollupError::ConfigurationNotFound { id: id.to_string() })
    }

    pub fn list_configurations(
        &self,
        filter: &ConfigurationFilter,
    ) -> RollupResult<Vec<RollupConfiguration>> {
        Ok(self.store.list_configurations(filter)?)
    }

    /// Apply `input` if `input.expected_version` is still current. The stored
    /// version increases by exactly one.
    pub fn update_configuration(
        &self,
        id: &str,
        updated_by: &str,
        input: UpdateRollupInput,
    ) -> RollupResult<RollupConfiguration> {
        let current = self.get_configuration(id)?;
        if current.version != input.expected_version {
            return Err(RollupError::VersionConflict {
                id: id.to_string(),
                expected: input.expected_version,
                current: current.version,
            });
        }
        if let Some(status) = input.status {
            if !current.status.can_transition_to(status) {
                return Err(RollupError::InvalidStateTransition {
                    id: id.to_string(),
                    from: current.status.to_string(),
                    to: status.to_string(),
                });
            }
        }

        let mut next = input.apply_to(&current);
        next.updated_by = Some(updated_by.to_string());
        next.updated_at = Utc::now();
        validate_configuration(&next)?;
        let stored = self.store.update_configuration(&next, input.expected_version)?;

        info!(rollup_id = %id, version = stored.version, "rollup configuration updated");
        self.publish(
            &stored.tenant_id,
            Some(updated_by.to_string()),
            EventPayload::ConfigurationUpdated(ConfigurationUpdatedEvent {
                rollup_id: stored.id.clone(),
                version: stored.version,
                changed_fields: input.changed_fields(),
            }),
        );
        Ok(stored)
    }

    /// Delete a configuration with its executions and artifacts. Rejected
    /// while it is executing.
    pub fn delete_configuration(&self, id: &str) -> RollupResult<()> {
        let current = self.get_configuration(id)?;
        if current.status == RollupStatus::Executing {
            return Err(RollupError::ExecutionInProgress {
                rollup_id: id.to_string(),
                status: current.status,
                active_execution_id: self.executor.active_execution(id),
            });
        }
        if !self.store.delete_configuration(id)? {
            return Err(RollupError::ConfigurationNotFound { id: id.to_string() });
        }
        info!(rollup_id = %id, "rollup configuration deleted");
        self.publish(
            &current.tenant_id,
            None,
            EventPayload::ConfigurationDeleted(ConfigurationDeletedEvent {
                rollup_id: id.to_string(),
            }),
        );
        Ok(())
    }

    // ── Executions ──

    pub async fn execute(
        &self,
        config_id: &str,
        overrides: ExecuteOverrides,
    ) -> RollupResult<ExecutionHandle> {
        let config = self.get_configuration(config_id)?;
        if config.status == RollupStatus::Archived {
            return Err(RollupError::InvalidStateTransition {
                id: config.id,
                from: RollupStatus::Archived.to_string(),
                to: RollupStatus::Executing.to_string(),
            });
        }
        validate_configuration(&config)?;
        validate_overrides(&overrides)?;
        self.executor.execute(config_id, overrides).await
    }

    pub fn cancel(&self, execution_id: &str, reason: Option<String>) -> RollupResult<()> {
        self.executor.cancel(execution_id, reason)
    }

    pub fn get_execution(&self, execution_id: &str) -> RollupResult<RollupExecution> {
        self.store
            .get_execution(execution_id)?
            .ok_or_else(|| RollupError::ExecutionNotFound {
                id: execution_id.to_string(),
            })
    }

    pub fn list_executions(
        &self,
        config_id: &str,
        limit: Option<usize>,
    ) -> RollupResult<Vec<RollupExecution>> {
        self.get_configuration(config_id)?;
        Ok(self.store.list_executions(config_id, limit)?)
    }

    /// Match details of an execution run with `includeMatchDetails`.
    pub fn get_match_results(&self, execution_id: &str) -> RollupResult<Vec<MatchResult>> {
        self.get_execution(execution_id)?;
        Ok(self.store.load_match_results(execution_id)?)
    }

    fn completed_execution(
        &self,
        config_id: &str,
        execution_id: &str,
    ) -> RollupResult<RollupExecution> {
        let execution = self.get_execution(execution_id)?;
        if execution.rollup_id != config_id {
            return Err(RollupError::ExecutionNotFound {
                id: execution_id.to_string(),
            });
        }
        if execution.status != ExecutionStatus::Completed {
            return Err(RollupError::ExecutionNotCompleted {
                id: execution_id.to_string(),
                status: execution.status,
            });
        }
        Ok(execution)
    }

    // ── Blast radius ──

    pub fn blast_radius(
        &self,
        config_id: &str,
        execution_id: &str,
        query: &BlastRadiusQuery,
    ) -> RollupResult<BlastRadiusResult> {
        self.completed_execution(config_id, execution_id)?;
        let index = self.blast_radius.index_for(execution_id, || {
            self.store
                .load_merged_graph(execution_id)?
                .ok_or_else(|| {
                    StorageError::not_found(rollup_core::errors::ENTITY_MERGED_GRAPH, execution_id)
                        .into()
                })
        })?;
        self.blast_radius
            .analyze(&index, config_id, execution_id, query)
    }

    // ── Triggers ──

    /// Start every configuration of `tenant_id` that runs on completed scans
    /// of `repository_id`. Configurations already executing are skipped.
    pub async fn on_scan_completed(
        &self,
        tenant_id: &str,
        repository_id: &str,
    ) -> RollupResult<Vec<ExecutionHandle>> {
        let configs = self
            .store
            .list_configurations(&ConfigurationFilter::for_tenant(tenant_id))?;
        let mut handles = Vec::new();
        for config in configs {
            if !should_trigger_on_scan(&config, repository_id) {
                continue;
            }
            let overrides = ExecuteOverrides {
                run_async: true,
                triggered_by: Some(format!("scan:{repository_id}")),
                ..ExecuteOverrides::default()
            };
            match self.execute(&config.id, overrides).await {
                Ok(handle) => handles.push(handle),
                Err(RollupError::ExecutionInProgress { .. }) => {
                    info!(rollup_id = %config.id, %repository_id, "scan trigger skipped, execution in progress");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(handles)
    }
}
