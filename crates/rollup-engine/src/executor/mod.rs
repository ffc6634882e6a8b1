//! Rollup executor: runs attempts off the async runtime, enforces one active
//! execution per configuration, applies the timeout and drives the retry
//! chain.

pub mod lifecycle;
pub mod pipeline;
pub mod progress;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rollup_core::config::{ExecutorConfig, MatchingConfig};
use rollup_core::errors::RecoveryAction;
use rollup_core::events::{
    ExecutionCancelledEvent, ExecutionFailedEvent, ExecutionRetryingEvent, ExecutionTimedOutEvent,
};
use rollup_core::models::{
    ExecuteOverrides, ExecutionError, ExecutionHandle, ExecutionStatus, RollupConfiguration,
    RollupExecution, RollupStatus, Termination,
};
use rollup_core::{
    EventPayload, EventPublisher, FxHashMap, GraphSource, RollupError, RollupErrorCode,
    RollupResult, RollupStore,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};

pub use lifecycle::{apply_event, replay_events, ExecutionLifecycle, RecordedEvent};
pub use pipeline::Attempt;

use crate::control::{CancellationToken, Interruption};

/// Attempts to write a configuration status before giving up on a CAS race.
const STATUS_UPDATE_ATTEMPTS: usize = 5;

#[derive(Default)]
struct Registry {
    /// Execution id → token of the attempt currently running it.
    tokens: FxHashMap<String, CancellationToken>,
    /// Rollup id → execution id of its active attempt.
    active: FxHashMap<String, String>,
    /// One async mutex per rollup; held for the whole retry chain.
    rollup_locks: FxHashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

/// Run store-bound work on the blocking pool. The lifecycle lock is held
/// across the store write, so it never runs on a runtime worker.
async fn off_runtime<T, F>(work: F) -> RollupResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> RollupResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RollupError::Internal(format!("blocking task failed: {e}")))?
}

/// Record of an execution failure in the form stored on the execution.
pub fn execution_error(error: &RollupError) -> ExecutionError {
    ExecutionError {
        code: error.error_code().to_string(),
        message: error.root().to_string(),
        phase: error.phase(),
        details: match error.root() {
            RollupError::InvalidConfiguration { errors } => Some(serde_json::json!(errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>())),
            RollupError::MaxNodesExceeded { limit, actual } => {
                Some(serde_json::json!({ "limit": limit, "actual": actual }))
            }
            _ => None,
        },
    }
}

pub struct RollupExecutor {
    store: Arc<dyn RollupStore>,
    graph_source: Arc<dyn GraphSource>,
    publisher: Arc<dyn EventPublisher>,
    config: ExecutorConfig,
    matching: MatchingConfig,
    registry: Mutex<Registry>,
}

impl RollupExecutor {
    pub fn new(
        store: Arc<dyn RollupStore>,
        graph_source: Arc<dyn GraphSource>,
        publisher: Arc<dyn EventPublisher>,
        config: ExecutorConfig,
        matching: MatchingConfig,
    ) -> Self {
        Self {
            store,
            graph_source,
            publisher,
            config,
            matching,
            registry: Mutex::new(Registry::default()),
        }
    }

    fn registry(&self) -> RollupResult<MutexGuard<'_, Registry>> {
        self.registry
            .lock()
            .map_err(|_| RollupError::Internal("executor registry lock poisoned".into()))
    }

    fn rollup_lock(&self, rollup_id: &str) -> RollupResult<Arc<tokio::sync::Mutex<()>>> {
        let mut registry = self.registry()?;
        Ok(Arc::clone(
            registry
                .rollup_locks
                .entry(rollup_id.to_string())
                .or_default(),
        ))
    }

    /// Execution id of the attempt currently running for `rollup_id`.
    pub fn active_execution(&self, rollup_id: &str) -> Option<String> {
        self.registry()
            .ok()
            .and_then(|r| r.active.get(rollup_id).cloned())
    }

    fn load_configuration(&self, id: &str) -> RollupResult<RollupConfiguration> {
        self.store
            .get_configuration(id)?
            .ok_or_else(|| RollupError::ConfigurationNotFound { id: id.to_string() })
    }

    /// Set the stored status, retrying on version races with concurrent
    /// updates. Returns the status it replaced.
    fn set_status(&self, rollup_id: &str, status: RollupStatus) -> RollupResult<RollupStatus> {
        let mut last_error = None;
        for _ in 0..STATUS_UPDATE_ATTEMPTS {
            let mut config = self.load_configuration(rollup_id)?;
            let previous = config.status;
            if previous == status {
                return Ok(previous);
            }
            config.status = status;
            config.updated_at = chrono::Utc::now();
            let expected = config.version;
            match self.store.update_configuration(&config, expected) {
                Ok(_) => return Ok(previous),
                Err(e) => {
                    let e = RollupError::from(e);
                    if !matches!(e, RollupError::VersionConflict { .. }) {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RollupError::Internal("status update failed".into())))
    }

    /// Start an execution of `rollup_id`.
    ///
    /// Without `force` a configuration that is already executing is rejected
    /// with `EXECUTION_IN_PROGRESS`; with `force` the new execution is queued
    /// behind the active one. Synchronous requests return the terminal
    /// projection of the last attempt. `async` requests return the pending
    /// execution at once, even while a forced request is still queued.
    pub async fn execute(
        self: &Arc<Self>,
        rollup_id: &str,
        overrides: ExecuteOverrides,
    ) -> RollupResult<ExecutionHandle> {
        let lock = self.rollup_lock(rollup_id)?;
        let held = if overrides.force {
            None
        } else {
            match Arc::clone(&lock).try_lock_owned() {
                Ok(guard) => Some(guard),
                Err(_) => {
                    return Err(RollupError::ExecutionInProgress {
                        rollup_id: rollup_id.to_string(),
                        status: RollupStatus::Executing,
                        active_execution_id: self.active_execution(rollup_id),
                    })
                }
            }
        };

        let config = self.load_configuration(rollup_id)?;
        if config.status == RollupStatus::Executing && !overrides.force {
            return Err(RollupError::ExecutionInProgress {
                rollup_id: rollup_id.to_string(),
                status: config.status,
                active_execution_id: self.active_execution(rollup_id),
            });
        }

        let mut first = RollupExecution::pending(
            uuid::Uuid::new_v4().to_string(),
            &config.id,
            &config.tenant_id,
            1,
        );
        first.include_match_details = overrides.include_match_details;
        first.triggered_by = overrides.triggered_by.clone();
        self.store.insert_execution(&first)?;

        if overrides.run_async {
            let handle = ExecutionHandle {
                execution_id: first.id.clone(),
                rollup_id: config.id.clone(),
                status: first.status,
                execution: None,
            };
            let executor = Arc::clone(self);
            tokio::spawn(async move {
                let guard = match held {
                    Some(guard) => guard,
                    None => lock.lock_owned().await,
                };
                let execution_id = first.id.clone();
                if let Err(e) = executor.start_chain(overrides, first, guard).await {
                    error!(%execution_id, error = %e, "rollup execution could not start");
                }
            });
            return Ok(handle);
        }

        let guard = match held {
            Some(guard) => guard,
            None => lock.lock_owned().await,
        };
        let last = self.start_chain(overrides, first, guard).await?;
        Ok(ExecutionHandle {
            execution_id: last.id.clone(),
            rollup_id: last.rollup_id.clone(),
            status: last.status,
            execution: Some(last),
        })
    }

    /// Mark the configuration executing and run the chain. Called once the
    /// rollup lock is held.
    async fn start_chain(
        self: &Arc<Self>,
        overrides: ExecuteOverrides,
        first: RollupExecution,
        guard: OwnedMutexGuard<()>,
    ) -> RollupResult<RollupExecution> {
        let previous_status = self.set_status(&first.rollup_id, RollupStatus::Executing)?;
        let config = self.load_configuration(&first.rollup_id)?;
        Ok(self
            .run_chain(config, overrides, first, previous_status, guard)
            .await)
    }

    /// Run attempts until one completes, one ends non-retryably, or attempts
    /// run out. Returns the last attempt's projection.
    async fn run_chain(
        self: &Arc<Self>,
        config: RollupConfiguration,
        overrides: ExecuteOverrides,
        first: RollupExecution,
        previous_status: RollupStatus,
        _guard: OwnedMutexGuard<()>,
    ) -> RollupExecution {
        let chain_root = first.id.clone();
        let timeout_seconds = overrides
            .timeout_seconds
            .unwrap_or(self.config.default_timeout_seconds);
        let max_attempts = self.config.max_attempts.max(1);
        let mut lifecycle = Arc::new(self.lifecycle(first, &chain_root));

        let last = loop {
            let execution_id = lifecycle.execution_id();
            let token = CancellationToken::new(&execution_id);
            self.register(&config.id, &token);

            let outcome = self
                .run_attempt(&config, &overrides, &lifecycle, &token, timeout_seconds)
                .await;
            self.unregister(&config.id, &execution_id);

            let Err(err) = outcome else {
                break lifecycle.snapshot();
            };
            let snapshot = lifecycle.snapshot();
            let progress_percent = snapshot
                .as_ref()
                .map(|s| s.progress_percent)
                .unwrap_or_default();
            let phase = snapshot.as_ref().ok().and_then(|s| s.phase);

            match err.root() {
                RollupError::ExecutionCancelled { reason, .. } => {
                    info!(%execution_id, reason = ?reason, "rollup execution cancelled");
                    self.record_terminal(
                        &lifecycle,
                        EventPayload::ExecutionCancelled(ExecutionCancelledEvent {
                            execution_id: execution_id.clone(),
                            rollup_id: config.id.clone(),
                            phase,
                            progress_percent,
                            reason: reason.clone(),
                        }),
                    )
                    .await;
                    break lifecycle.snapshot();
                }
                RollupError::ExecutionTimeout {
                    timeout_seconds, ..
                } => {
                    warn!(%execution_id, timeout_seconds, "rollup execution timed out");
                    self.record_terminal(
                        &lifecycle,
                        EventPayload::ExecutionTimedOut(ExecutionTimedOutEvent {
                            execution_id: execution_id.clone(),
                            rollup_id: config.id.clone(),
                            phase,
                            progress_percent,
                            timeout_seconds: *timeout_seconds,
                        }),
                    )
                    .await;
                    break lifecycle.snapshot();
                }
                _ => {}
            }

            let attempt = snapshot.as_ref().map(|s| s.attempt).unwrap_or(1);
            let will_retry =
                RecoveryAction::for_error(&err).is_retryable() && attempt < max_attempts;
            let recorded_error = execution_error(&err);
            error!(
                %execution_id,
                attempt,
                will_retry,
                code = %recorded_error.code,
                error = %err,
                "rollup execution failed"
            );
            self.record_terminal(
                &lifecycle,
                EventPayload::ExecutionFailed(ExecutionFailedEvent {
                    execution_id: execution_id.clone(),
                    rollup_id: config.id.clone(),
                    attempt,
                    error: recorded_error.clone(),
                    will_retry,
                    progress_percent,
                }),
            )
            .await;
            if !will_retry {
                break lifecycle.snapshot();
            }

            let delay = self.config.retry_delay(attempt);
            let retry = {
                let executor = Arc::clone(self);
                let config = config.clone();
                let overrides = overrides.clone();
                let previous_id = execution_id.clone();
                let chain_root = chain_root.clone();
                off_runtime(move || {
                    executor.prepare_retry(
                        &config,
                        &overrides,
                        &previous_id,
                        attempt,
                        max_attempts,
                        recorded_error,
                        delay,
                        &chain_root,
                    )
                })
                .await
            };
            match retry {
                Ok(next) => lifecycle = next,
                Err(e) => {
                    error!(%execution_id, error = %e, "could not schedule retry");
                    break lifecycle.snapshot();
                }
            }
            tokio::time::sleep(delay).await;
        };

        let last = match last {
            Ok(last) => last,
            Err(e) => {
                error!(error = %e, "execution projection unavailable");
                match self.store.get_execution(&chain_root) {
                    Ok(Some(stored)) => stored,
                    _ => RollupExecution::pending(chain_root.clone(), &config.id, &config.tenant_id, 1),
                }
            }
        };

        let final_status = match last.termination {
            Some(Termination::Completed) => RollupStatus::Completed,
            Some(Termination::Failed) => RollupStatus::Failed,
            Some(Termination::Cancelled) | Some(Termination::TimedOut) | None => previous_status,
        };
        if let Err(e) = self.set_status(&config.id, final_status) {
            error!(rollup_id = %config.id, error = %e, "could not restore configuration status");
        }
        last
    }

    fn lifecycle(&self, execution: RollupExecution, chain_root: &str) -> ExecutionLifecycle {
        ExecutionLifecycle::new(
            execution,
            Arc::clone(&self.store),
            Arc::clone(&self.publisher),
            chain_root,
            self.config.progress_step_percent,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare_retry(
        &self,
        config: &RollupConfiguration,
        overrides: &ExecuteOverrides,
        previous_id: &str,
        attempt: u32,
        max_attempts: u32,
        previous_error: ExecutionError,
        delay: Duration,
        chain_root: &str,
    ) -> RollupResult<Arc<ExecutionLifecycle>> {
        let mut next = RollupExecution::pending(
            uuid::Uuid::new_v4().to_string(),
            &config.id,
            &config.tenant_id,
            attempt + 1,
        );
        next.include_match_details = overrides.include_match_details;
        next.triggered_by = overrides.triggered_by.clone();
        self.store.insert_execution(&next)?;
        self.store.link_retry(previous_id, &next.id)?;

        let lifecycle = Arc::new(self.lifecycle(next.clone(), chain_root));
        lifecycle.record(EventPayload::ExecutionRetrying(ExecutionRetryingEvent {
            execution_id: next.id.clone(),
            rollup_id: config.id.clone(),
            previous_execution_id: previous_id.to_string(),
            attempt: attempt + 1,
            max_attempts,
            previous_error,
            delay_ms: delay.as_millis() as u64,
        }))?;
        info!(
            previous_execution_id = %previous_id,
            execution_id = %next.id,
            attempt = attempt + 1,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "retrying rollup execution"
        );
        Ok(lifecycle)
    }

    async fn record_terminal(&self, lifecycle: &Arc<ExecutionLifecycle>, payload: EventPayload) {
        let recorder = Arc::clone(lifecycle);
        if let Err(e) = off_runtime(move || recorder.record(payload)).await {
            error!(
                execution_id = %lifecycle.execution_id(),
                error = %e,
                "terminal event rejected"
            );
        }
    }

    /// Run one attempt on a blocking thread under the timeout.
    async fn run_attempt(
        &self,
        config: &RollupConfiguration,
        overrides: &ExecuteOverrides,
        lifecycle: &Arc<ExecutionLifecycle>,
        token: &CancellationToken,
        timeout_seconds: u64,
    ) -> RollupResult<()> {
        let attempt = Attempt {
            config: config.clone(),
            overrides: overrides.clone(),
            matching: self.matching.clone(),
            graph_source: Arc::clone(&self.graph_source),
            store: Arc::clone(&self.store),
            lifecycle: Arc::clone(lifecycle),
            token: token.clone(),
        };
        let mut handle = tokio::task::spawn_blocking(move || attempt.run());
        let joined = match tokio::time::timeout(
            Duration::from_secs(timeout_seconds),
            &mut handle,
        )
        .await
        {
            Ok(joined) => joined,
            Err(_) => {
                token.time_out(timeout_seconds);
                handle.await
            }
        };
        let result = joined
            .map_err(|e| RollupError::Internal(format!("execution task failed: {e}")))?;

        match (result, token.interruption()) {
            (Ok(()), _) => Ok(()),
            // Whatever the worker hit after the token tripped, the trip is the cause.
            (Err(_), Some(Interruption::TimedOut { timeout_seconds })) => {
                Err(RollupError::ExecutionTimeout {
                    execution_id: token.execution_id().to_string(),
                    timeout_seconds,
                })
            }
            (Err(_), Some(Interruption::Cancelled { reason })) => {
                Err(RollupError::ExecutionCancelled {
                    execution_id: token.execution_id().to_string(),
                    reason,
                })
            }
            (Err(e), None) => Err(e),
        }
    }

    fn register(&self, rollup_id: &str, token: &CancellationToken) {
        if let Ok(mut registry) = self.registry() {
            registry
                .tokens
                .insert(token.execution_id().to_string(), token.clone());
            registry
                .active
                .insert(rollup_id.to_string(), token.execution_id().to_string());
        }
    }

    fn unregister(&self, rollup_id: &str, execution_id: &str) {
        if let Ok(mut registry) = self.registry() {
            registry.tokens.remove(execution_id);
            if registry.active.get(rollup_id).map(String::as_str) == Some(execution_id) {
                registry.active.remove(rollup_id);
            }
        }
    }

    /// Request cooperative cancellation. Only running executions accept it;
    /// the execution stops at its next checkpoint.
    pub fn cancel(&self, execution_id: &str, reason: Option<String>) -> RollupResult<()> {
        let stored = self
            .store
            .get_execution(execution_id)?
            .ok_or_else(|| RollupError::ExecutionNotFound {
                id: execution_id.to_string(),
            })?;
        let token = self.registry()?.tokens.get(execution_id).cloned();
        match token {
            Some(token) if stored.status == ExecutionStatus::Running => {
                if token.cancel(reason.clone()) {
                    info!(%execution_id, reason = ?reason, "cancellation requested");
                }
                Ok(())
            }
            _ => Err(RollupError::ExecutionNotRunning {
                id: execution_id.to_string(),
                status: stored.status,
            }),
        }
    }
}
