use super::error_code::{self, RollupErrorCode};
use super::storage_error::{ENTITY_CONFIGURATION, ENTITY_EXECUTION};
use super::{StorageError, ValidationError};
use crate::models::{ExecutionPhase, ExecutionStatus, RollupStatus};

/// Top-level error type for the rollup engine.
/// Subsystem errors convert into this via `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum RollupError {
    #[error("invalid configuration: {}", join_messages(.errors))]
    InvalidConfiguration { errors: Vec<ValidationError> },

    #[error("rollup configuration not found: {id}")]
    ConfigurationNotFound { id: String },

    #[error("version conflict on {id}: expected {expected}, current {current}")]
    VersionConflict {
        id: String,
        expected: u64,
        current: u64,
    },

    #[error("rollup {rollup_id} is already {status}")]
    ExecutionInProgress {
        rollup_id: String,
        status: RollupStatus,
        active_execution_id: Option<String>,
    },

    #[error("execution not found: {id}")]
    ExecutionNotFound { id: String },

    #[error("execution {id} is {status}, not running")]
    ExecutionNotRunning { id: String, status: ExecutionStatus },

    #[error("execution {id} is {status}, not completed")]
    ExecutionNotCompleted { id: String, status: ExecutionStatus },

    #[error("invalid state transition for {id}: {from} -> {to}")]
    InvalidStateTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("execution {execution_id} timed out after {timeout_seconds}s")]
    ExecutionTimeout {
        execution_id: String,
        timeout_seconds: u64,
    },

    #[error("execution {execution_id} cancelled{}", reason_suffix(.reason))]
    ExecutionCancelled {
        execution_id: String,
        reason: Option<String>,
    },

    #[error("merged graph would have {actual} nodes, limit is {limit}")]
    MaxNodesExceeded { limit: usize, actual: usize },

    #[error("repository not found: {repository_id}")]
    RepositoryNotFound { repository_id: String },

    #[error("scan {scan_id} not found for repository {repository_id}")]
    ScanNotFound {
        repository_id: String,
        scan_id: String,
    },

    #[error("graph source unavailable: {reason}")]
    GraphSourceUnavailable { reason: String },

    #[error("{conflicts} merge conflict(s) under the error policy")]
    MergeConflict { conflicts: usize },

    #[error("invalid blast radius query: {0}")]
    InvalidQuery(String),

    #[error("node not found in execution {execution_id}: {node_id}")]
    NodeNotFound {
        execution_id: String,
        node_id: String,
    },

    #[error("{phase} phase failed: {source}")]
    PhaseFailed {
        phase: ExecutionPhase,
        #[source]
        source: Box<RollupError>,
    },

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias.
pub type RollupResult<T> = Result<T, RollupError>;

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {r}"))
        .unwrap_or_default()
}

impl RollupError {
    pub fn in_phase(self, phase: ExecutionPhase) -> Self {
        match self {
            already @ Self::PhaseFailed { .. } => already,
            other => Self::PhaseFailed {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// The error with any phase wrapper removed.
    pub fn root(&self) -> &RollupError {
        match self {
            Self::PhaseFailed { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn phase(&self) -> Option<ExecutionPhase> {
        match self {
            Self::PhaseFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

impl From<ValidationError> for RollupError {
    fn from(error: ValidationError) -> Self {
        Self::InvalidConfiguration {
            errors: vec![error],
        }
    }
}

impl From<StorageError> for RollupError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::VersionConflict {
                id,
                expected,
                current,
            } => Self::VersionConflict {
                id,
                expected,
                current,
            },
            StorageError::NotFound { entity, id } if entity == ENTITY_CONFIGURATION => {
                Self::ConfigurationNotFound { id }
            }
            StorageError::NotFound { entity, id } if entity == ENTITY_EXECUTION => {
                Self::ExecutionNotFound { id }
            }
            other => Self::Storage(other),
        }
    }
}

impl RollupErrorCode for RollupError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => error_code::INVALID_CONFIGURATION,
            Self::ConfigurationNotFound { .. } => error_code::CONFIGURATION_NOT_FOUND,
            Self::VersionConflict { .. } => error_code::VERSION_CONFLICT,
            Self::ExecutionInProgress { .. } => error_code::EXECUTION_IN_PROGRESS,
            Self::ExecutionNotFound { .. } => error_code::EXECUTION_NOT_FOUND,
            Self::ExecutionNotRunning { .. } => error_code::EXECUTION_NOT_RUNNING,
            Self::ExecutionNotCompleted { .. } => error_code::EXECUTION_NOT_COMPLETED,
            Self::InvalidStateTransition { .. } => error_code::INVALID_STATE_TRANSITION,
            Self::ExecutionTimeout { .. } => error_code::EXECUTION_TIMEOUT,
            Self::ExecutionCancelled { .. } => error_code::EXECUTION_CANCELLED,
            Self::MaxNodesExceeded { .. } => error_code::MAX_NODES_EXCEEDED,
            Self::RepositoryNotFound { .. } => error_code::REPOSITORY_NOT_FOUND,
            Self::ScanNotFound { .. } => error_code::SCAN_NOT_FOUND,
            Self::GraphSourceUnavailable { .. } => error_code::GRAPH_SOURCE_UNAVAILABLE,
            Self::MergeConflict { .. } => error_code::MERGE_CONFLICT,
            Self::InvalidQuery(_) => error_code::INVALID_QUERY,
            Self::NodeNotFound { .. } => error_code::NODE_NOT_FOUND,
            Self::PhaseFailed { source, .. } => source.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Serialization(_) => error_code::SERIALIZATION_ERROR,
            Self::Config(_) => error_code::CONFIG_ERROR,
            Self::Internal(_) => error_code::INTERNAL_ERROR,
        }
    }
}
