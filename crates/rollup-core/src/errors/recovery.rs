//! RecoveryAction enum: what to do when a rollup operation fails.

use std::fmt;

use super::{RollupError, StorageError};

/// Recommended recovery action for a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation (transient failure like a busy database).
    Retry,
    /// Surface to the caller; retrying cannot help.
    Escalate,
    /// Expected termination, not a defect.
    Ignore,
}

impl RecoveryAction {
    /// Determine the recommended recovery action for a RollupError.
    pub fn for_error(error: &RollupError) -> Self {
        match error {
            RollupError::PhaseFailed { source, .. } => Self::for_error(source),

            // Transient: retry
            RollupError::GraphSourceUnavailable { .. } => Self::Retry,
            RollupError::Storage(StorageError::DbBusy) => Self::Retry,
            RollupError::Storage(StorageError::SqliteError { .. }) => Self::Retry,

            // Cooperative terminations
            RollupError::ExecutionCancelled { .. } => Self::Ignore,
            RollupError::ExecutionTimeout { .. } => Self::Ignore,

            // Unrecoverable for this configuration: escalate
            RollupError::MaxNodesExceeded { .. } => Self::Escalate,
            RollupError::RepositoryNotFound { .. } => Self::Escalate,
            RollupError::ScanNotFound { .. } => Self::Escalate,
            RollupError::MergeConflict { .. } => Self::Escalate,

            // Caller errors
            RollupError::InvalidConfiguration { .. }
            | RollupError::ConfigurationNotFound { .. }
            | RollupError::VersionConflict { .. }
            | RollupError::ExecutionInProgress { .. }
            | RollupError::ExecutionNotFound { .. }
            | RollupError::ExecutionNotRunning { .. }
            | RollupError::ExecutionNotCompleted { .. }
            | RollupError::InvalidStateTransition { .. }
            | RollupError::InvalidQuery(_)
            | RollupError::NodeNotFound { .. } => Self::Escalate,

            // Data errors: likely a bug
            RollupError::Storage(_) => Self::Escalate,
            RollupError::Serialization(_) => Self::Escalate,
            RollupError::Config(_) => Self::Escalate,
            RollupError::Internal(_) => Self::Escalate,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retry)
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "Retry"),
            Self::Escalate => write!(f, "Escalate"),
            Self::Ignore => write!(f, "Ignore"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExecutionPhase;

    #[test]
    fn transient_errors_retry_through_phase_wrapper() {
        let err = RollupError::GraphSourceUnavailable {
            reason: "connection reset".into(),
        }
        .in_phase(ExecutionPhase::Loading);
        assert_eq!(RecoveryAction::for_error(&err), RecoveryAction::Retry);
    }

    #[test]
    fn max_nodes_is_not_retried() {
        let err = RollupError::MaxNodesExceeded {
            limit: 10,
            actual: 11,
        };
        assert_eq!(RecoveryAction::for_error(&err), RecoveryAction::Escalate);
    }

    #[test]
    fn cancellation_is_ignored() {
        let err = RollupError::ExecutionCancelled {
            execution_id: "e1".into(),
            reason: None,
        };
        assert_eq!(RecoveryAction::for_error(&err), RecoveryAction::Ignore);
    }
}
