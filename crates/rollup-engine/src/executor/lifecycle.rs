//! Execution lifecycle: an append-only event log per execution and the
//! `RollupExecution` projection folded from it.
//!
//! Every transition goes through [`ExecutionLifecycle::record`]: the event is
//! applied to the projection (illegal transitions are rejected), the
//! projection is persisted, and only then is the event published.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rollup_core::errors::error_code;
use rollup_core::events::ExecutionProgressEvent;
use rollup_core::models::{
    ExecutionError, ExecutionPhase, ExecutionStatus, PhaseTiming, RollupExecution, Termination,
};
use rollup_core::{EventEnvelope, EventPayload, EventPublisher, RollupError, RollupResult, RollupStore};
use tracing::{debug, warn};

use super::progress::{overall_progress, should_emit};

/// One entry of an execution's event log.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub sequence: u64,
    pub event_id: String,
    pub recorded_at: DateTime<Utc>,
    pub payload: EventPayload,
}

fn describe(state: &RollupExecution) -> String {
    match (state.status, state.phase) {
        (ExecutionStatus::Running, Some(phase)) => format!("running/{phase}"),
        (status, _) => status.as_str().to_string(),
    }
}

fn illegal(state: &RollupExecution, payload: &EventPayload) -> RollupError {
    RollupError::InvalidStateTransition {
        id: state.id.clone(),
        from: describe(state),
        to: payload.event_type().as_str().to_string(),
    }
}

fn require(ok: bool, state: &RollupExecution, payload: &EventPayload) -> RollupResult<()> {
    if ok {
        Ok(())
    } else {
        Err(illegal(state, payload))
    }
}

fn current_phase_open(state: &RollupExecution) -> bool {
    state
        .phase_timings
        .last()
        .is_some_and(|t| t.completed_at.is_none())
}

/// Apply one event to the projection. On error the state is left untouched.
pub fn apply_event(
    state: &mut RollupExecution,
    payload: &EventPayload,
    at: DateTime<Utc>,
) -> RollupResult<()> {
    if let Some(execution_id) = payload.execution_id() {
        if execution_id != state.id {
            return Err(RollupError::Internal(format!(
                "event for {execution_id} applied to execution {}",
                state.id
            )));
        }
    }
    let running = state.status == ExecutionStatus::Running;

    match payload {
        EventPayload::ExecutionStarted(_) => {
            require(state.status == ExecutionStatus::Pending, state, payload)?;
            state.status = ExecutionStatus::Running;
            state.started_at = Some(at);
        }
        EventPayload::PhaseStarted(e) => {
            let expected = match state.phase {
                None => Some(ExecutionPhase::Loading),
                Some(phase) if !current_phase_open(state) => phase.next(),
                Some(_) => None,
            };
            require(running && expected == Some(e.phase), state, payload)?;
            state.phase = Some(e.phase);
            state.phase_timings.push(PhaseTiming {
                phase: e.phase,
                started_at: at,
                completed_at: None,
                duration_ms: None,
            });
            state.progress_percent = state.progress_percent.max(e.phase.progress_band().0);
        }
        EventPayload::PhaseCompleted(e) => {
            require(
                running && state.phase == Some(e.phase) && current_phase_open(state),
                state,
                payload,
            )?;
            if let Some(timing) = state.phase_timings.last_mut() {
                timing.completed_at = Some(at);
                timing.duration_ms = Some(e.duration_ms);
            }
            state.stats = e.stats.clone();
            if !e.scan_ids.is_empty() {
                state.scan_ids = e.scan_ids.clone();
            }
            state.progress_percent = state.progress_percent.max(e.phase.progress_band().1);
        }
        EventPayload::ExecutionProgress(e) => {
            require(running && state.phase == Some(e.phase), state, payload)?;
            state.progress_percent = state.progress_percent.max(e.progress_percent.min(100));
        }
        EventPayload::MatchingCompleted(_)
        | EventPayload::MergeConflict(_)
        | EventPayload::MergeCompleted(_) => {
            require(running, state, payload)?;
        }
        EventPayload::ExecutionCompleted(e) => {
            require(
                running
                    && state.phase == Some(ExecutionPhase::Storing)
                    && !current_phase_open(state),
                state,
                payload,
            )?;
            state.status = ExecutionStatus::Completed;
            state.termination = Some(Termination::Completed);
            state.stats = e.stats.clone();
            state.progress_percent = 100;
            state.completed_at = Some(at);
        }
        EventPayload::ExecutionFailed(e) => {
            require(!state.is_terminal(), state, payload)?;
            state.status = ExecutionStatus::Failed;
            state.termination = Some(Termination::Failed);
            state.error = Some(e.error.clone());
            state.completed_at = Some(at);
        }
        EventPayload::ExecutionCancelled(e) => {
            require(running, state, payload)?;
            state.status = ExecutionStatus::Failed;
            state.termination = Some(Termination::Cancelled);
            state.error = Some(ExecutionError {
                code: error_code::EXECUTION_CANCELLED.to_string(),
                message: match &e.reason {
                    Some(reason) => format!("cancelled: {reason}"),
                    None => "cancelled".to_string(),
                },
                phase: state.phase,
                details: None,
            });
            state.completed_at = Some(at);
        }
        EventPayload::ExecutionTimedOut(e) => {
            require(!state.is_terminal(), state, payload)?;
            state.status = ExecutionStatus::Failed;
            state.termination = Some(Termination::TimedOut);
            state.error = Some(ExecutionError {
                code: error_code::EXECUTION_TIMEOUT.to_string(),
                message: format!("timed out after {}s", e.timeout_seconds),
                phase: state.phase,
                details: None,
            });
            state.completed_at = Some(at);
        }
        EventPayload::ExecutionRetrying(e) => {
            require(
                state.status == ExecutionStatus::Pending && state.retry_of.is_none(),
                state,
                payload,
            )?;
            state.retry_of = Some(e.previous_execution_id.clone());
            state.attempt = e.attempt;
        }
        EventPayload::ConfigurationCreated(_)
        | EventPayload::ConfigurationUpdated(_)
        | EventPayload::ConfigurationDeleted(_) => return Err(illegal(state, payload)),
    }
    Ok(())
}

/// Rebuild a projection by folding `events` over `initial`.
pub fn replay_events(
    initial: RollupExecution,
    events: &[RecordedEvent],
) -> RollupResult<RollupExecution> {
    let mut state = initial;
    for event in events {
        apply_event(&mut state, &event.payload, event.recorded_at)?;
    }
    Ok(state)
}

struct LifecycleState {
    log: Vec<RecordedEvent>,
    projection: RollupExecution,
}

/// The live event log of one execution.
pub struct ExecutionLifecycle {
    initial: RollupExecution,
    state: Mutex<LifecycleState>,
    store: Arc<dyn RollupStore>,
    publisher: Arc<dyn EventPublisher>,
    /// Id of the first execution of the retry chain.
    correlation_id: String,
    progress_step: u8,
}

impl ExecutionLifecycle {
    pub fn new(
        execution: RollupExecution,
        store: Arc<dyn RollupStore>,
        publisher: Arc<dyn EventPublisher>,
        correlation_id: impl Into<String>,
        progress_step: u8,
    ) -> Self {
        Self {
            initial: execution.clone(),
            state: Mutex::new(LifecycleState {
                log: Vec::new(),
                projection: execution,
            }),
            store,
            publisher,
            correlation_id: correlation_id.into(),
            progress_step,
        }
    }

    fn lock(&self) -> RollupResult<MutexGuard<'_, LifecycleState>> {
        self.state
            .lock()
            .map_err(|_| RollupError::Internal("execution lifecycle lock poisoned".into()))
    }

    pub fn execution_id(&self) -> String {
        self.initial.id.clone()
    }

    pub fn rollup_id(&self) -> &str {
        &self.initial.rollup_id
    }

    pub fn snapshot(&self) -> RollupResult<RollupExecution> {
        Ok(self.lock()?.projection.clone())
    }

    pub fn events(&self) -> RollupResult<Vec<RecordedEvent>> {
        Ok(self.lock()?.log.clone())
    }

    /// Rebuild the projection from the log.
    pub fn replay(&self) -> RollupResult<RollupExecution> {
        let log = self.events()?;
        replay_events(self.initial.clone(), &log)
    }

    /// Append `payload`, persist the new projection and publish.
    pub fn record(&self, payload: EventPayload) -> RollupResult<RollupExecution> {
        let mut state = self.lock()?;
        self.record_locked(&mut state, payload)
    }

    fn record_locked(
        &self,
        state: &mut LifecycleState,
        payload: EventPayload,
    ) -> RollupResult<RollupExecution> {
        let at = Utc::now();
        let mut next = state.projection.clone();
        apply_event(&mut next, &payload, at)?;
        if next != state.projection {
            self.store.update_execution(&next)?;
        }

        let causation_id = state.log.last().map(|e| e.event_id.clone());
        let envelope = EventEnvelope::new(next.tenant_id.clone(), payload)
            .with_correlation(Some(self.correlation_id.clone()))
            .with_causation(causation_id)
            .with_triggered_by(next.triggered_by.clone());
        debug!(
            execution_id = %next.id,
            event = %envelope.event_type(),
            progress = next.progress_percent,
            "lifecycle event"
        );
        state.log.push(RecordedEvent {
            sequence: state.log.len() as u64 + 1,
            event_id: envelope.event_id.clone(),
            recorded_at: at,
            payload: envelope.body.clone(),
        });
        state.projection = next.clone();
        self.publisher.publish(&envelope);
        Ok(next)
    }

    /// Record a progress event for `phase` if it moves overall progress by at
    /// least the configured step. Failures are logged, never surfaced to the
    /// worker that reported.
    pub fn report_progress(&self, phase: ExecutionPhase, phase_percent: u8) {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "progress dropped");
                return;
            }
        };
        if state.projection.phase != Some(phase) || state.projection.is_terminal() {
            return;
        }
        let overall = overall_progress(phase, phase_percent);
        let band_end = phase.progress_band().1;
        if !should_emit(state.projection.progress_percent, overall, self.progress_step, band_end) {
            return;
        }
        let payload = EventPayload::ExecutionProgress(ExecutionProgressEvent {
            execution_id: state.projection.id.clone(),
            rollup_id: state.projection.rollup_id.clone(),
            phase,
            phase_percent: phase_percent.min(100),
            progress_percent: overall,
        });
        if let Err(e) = self.record_locked(&mut state, payload) {
            warn!(execution_id = %state.projection.id, error = %e, "progress event rejected");
        }
    }
}
