//! Cooperative cancellation and progress reporting for CPU-bound phases.
//!
//! Workers call [`PhaseControl::checkpoint`] between blocks or components,
//! never inside a single match or merge.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use rollup_core::{RollupError, RollupResult};

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// Why a token tripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    Cancelled { reason: Option<String> },
    TimedOut { timeout_seconds: u64 },
}

/// Shared cancellation flag for one execution.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    execution_id: Arc<str>,
    state: Arc<AtomicU8>,
    timeout_seconds: Arc<AtomicU64>,
    reason: Arc<Mutex<Option<String>>>,
}

impl CancellationToken {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: Arc::from(execution_id.into()),
            state: Arc::new(AtomicU8::new(RUNNING)),
            timeout_seconds: Arc::new(AtomicU64::new(0)),
            reason: Arc::new(Mutex::new(None)),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Request cancellation. Returns false if the token had already tripped.
    pub fn cancel(&self, reason: Option<String>) -> bool {
        if let Ok(mut slot) = self.reason.lock() {
            if slot.is_none() {
                *slot = reason;
            }
        }
        self.state
            .compare_exchange(RUNNING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Trip the token because the execution ran out of time.
    pub fn time_out(&self, timeout_seconds: u64) -> bool {
        self.timeout_seconds.store(timeout_seconds, Ordering::SeqCst);
        self.state
            .compare_exchange(RUNNING, TIMED_OUT, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Relaxed) != RUNNING
    }

    pub fn interruption(&self) -> Option<Interruption> {
        match self.state.load(Ordering::SeqCst) {
            CANCELLED => Some(Interruption::Cancelled {
                reason: self.reason.lock().ok().and_then(|r| r.clone()),
            }),
            TIMED_OUT => Some(Interruption::TimedOut {
                timeout_seconds: self.timeout_seconds.load(Ordering::SeqCst),
            }),
            _ => None,
        }
    }

    /// `Err` once the token has tripped.
    pub fn check(&self) -> RollupResult<()> {
        match self.interruption() {
            None => Ok(()),
            Some(Interruption::Cancelled { reason }) => Err(RollupError::ExecutionCancelled {
                execution_id: self.execution_id.to_string(),
                reason,
            }),
            Some(Interruption::TimedOut { timeout_seconds }) => {
                Err(RollupError::ExecutionTimeout {
                    execution_id: self.execution_id.to_string(),
                    timeout_seconds,
                })
            }
        }
    }
}

type ProgressFn<'a> = dyn Fn(u8) + Send + Sync + 'a;

/// What a phase sees of its execution: the cancellation flag and a sink for
/// phase-local progress (0–100).
#[derive(Clone, Copy)]
pub struct PhaseControl<'a> {
    token: Option<&'a CancellationToken>,
    progress: Option<&'a ProgressFn<'a>>,
}

impl<'a> PhaseControl<'a> {
    pub fn new(token: &'a CancellationToken, progress: &'a ProgressFn<'a>) -> Self {
        Self {
            token: Some(token),
            progress: Some(progress),
        }
    }

    /// No cancellation, no progress. For ad hoc use outside an execution.
    pub fn detached() -> Self {
        Self {
            token: None,
            progress: None,
        }
    }

    pub fn checkpoint(&self) -> RollupResult<()> {
        match self.token {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    pub fn report(&self, phase_percent: u8) {
        if let Some(progress) = self.progress {
            progress(phase_percent.min(100));
        }
    }

    /// Report `done / total` of the phase.
    pub fn report_fraction(&self, done: usize, total: usize) {
        if total == 0 {
            self.report(100);
        } else {
            self.report(((done.min(total) * 100) / total) as u8);
        }
    }
}

impl Default for PhaseControl<'_> {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_trip_wins() {
        let token = CancellationToken::new("e1");
        assert!(token.check().is_ok());
        assert!(token.cancel(Some("user".into())));
        assert!(!token.time_out(30));
        assert_eq!(
            token.interruption(),
            Some(Interruption::Cancelled {
                reason: Some("user".into())
            })
        );
        assert!(matches!(
            token.check(),
            Err(RollupError::ExecutionCancelled { .. })
        ));
    }

    #[test]
    fn timeout_reports_seconds() {
        let token = CancellationToken::new("e1");
        assert!(token.time_out(5));
        assert!(matches!(
            token.check(),
            Err(RollupError::ExecutionTimeout {
                timeout_seconds: 5,
                ..
            })
        ));
    }

    #[test]
    fn detached_control_never_trips() {
        let control = PhaseControl::detached();
        assert!(control.checkpoint().is_ok());
        control.report(50);
    }
}
