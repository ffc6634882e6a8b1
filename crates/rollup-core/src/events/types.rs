//! Event type names and typed payloads.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{ExecutionError, ExecutionPhase, RollupExecutionStats};
use crate::types::graph::NodeKey;

/// Every event type the engine publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RollupEventType {
    ConfigurationCreated,
    ConfigurationUpdated,
    ConfigurationDeleted,
    ExecutionStarted,
    PhaseStarted,
    PhaseCompleted,
    ExecutionProgress,
    MatchingCompleted,
    MergeConflict,
    MergeCompleted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionCancelled,
    ExecutionTimedOut,
    ExecutionRetrying,
}

impl RollupEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationCreated => "rollup.configuration.created",
            Self::ConfigurationUpdated => "rollup.configuration.updated",
            Self::ConfigurationDeleted => "rollup.configuration.deleted",
            Self::ExecutionStarted => "rollup.execution.started",
            Self::PhaseStarted => "rollup.execution.phase_started",
            Self::PhaseCompleted => "rollup.execution.phase_completed",
            Self::ExecutionProgress => "rollup.execution.progress",
            Self::MatchingCompleted => "rollup.matching.completed",
            Self::MergeConflict => "rollup.merge.conflict",
            Self::MergeCompleted => "rollup.merge.completed",
            Self::ExecutionCompleted => "rollup.execution.completed",
            Self::ExecutionFailed => "rollup.execution.failed",
            Self::ExecutionCancelled => "rollup.execution.cancelled",
            Self::ExecutionTimedOut => "rollup.execution.timed_out",
            Self::ExecutionRetrying => "rollup.execution.retrying",
        }
    }
}

impl fmt::Display for RollupEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationCreatedEvent {
    pub rollup_id: String,
    pub name: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationUpdatedEvent {
    pub rollup_id: String,
    pub version: u64,
    pub changed_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationDeletedEvent {
    pub rollup_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStartedEvent {
    pub execution_id: String,
    pub rollup_id: String,
    pub attempt: u32,
    pub repository_ids: Vec<String>,
    /// Scans pinned by configuration or request; others resolve to latest.
    pub requested_scan_ids: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseStartedEvent {
    pub execution_id: String,
    pub rollup_id: String,
    pub phase: ExecutionPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseCompletedEvent {
    pub execution_id: String,
    pub rollup_id: String,
    pub phase: ExecutionPhase,
    pub duration_ms: u64,
    /// Stats accumulated up to the end of this phase.
    pub stats: RollupExecutionStats,
    /// Scans actually loaded; set by the loading phase only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scan_ids: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionProgressEvent {
    pub execution_id: String,
    pub rollup_id: String,
    pub phase: ExecutionPhase,
    pub phase_percent: u8,
    pub progress_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingCompletedEvent {
    pub execution_id: String,
    pub rollup_id: String,
    pub blocks: usize,
    pub candidate_pairs: u64,
    pub total_matches: usize,
    pub matches_by_strategy: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeConflictEvent {
    pub execution_id: String,
    pub rollup_id: String,
    pub component: Vec<NodeKey>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCompletedEvent {
    pub execution_id: String,
    pub rollup_id: String,
    pub merged_nodes: usize,
    pub passthrough_nodes: usize,
    pub cross_repo_edges: usize,
    pub conflicts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionCompletedEvent {
    pub execution_id: String,
    pub rollup_id: String,
    pub duration_ms: u64,
    pub stats: RollupExecutionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailedEvent {
    pub execution_id: String,
    pub rollup_id: String,
    pub attempt: u32,
    pub error: ExecutionError,
    pub will_retry: bool,
    pub progress_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionCancelledEvent {
    pub execution_id: String,
    pub rollup_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ExecutionPhase>,
    pub progress_percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTimedOutEvent {
    pub execution_id: String,
    pub rollup_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ExecutionPhase>,
    pub progress_percent: u8,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRetryingEvent {
    /// The new execution.
    pub execution_id: String,
    pub rollup_id: String,
    pub previous_execution_id: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub previous_error: ExecutionError,
    pub delay_ms: u64,
}

/// Typed payload. Serialized adjacently as `{"type": ..., "payload": {...}}`
/// so it flattens into the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "rollup.configuration.created")]
    ConfigurationCreated(ConfigurationCreatedEvent),
    #[serde(rename = "rollup.configuration.updated")]
    ConfigurationUpdated(ConfigurationUpdatedEvent),
    #[serde(rename = "rollup.configuration.deleted")]
    ConfigurationDeleted(ConfigurationDeletedEvent),
    #[serde(rename = "rollup.execution.started")]
    ExecutionStarted(ExecutionStartedEvent),
    #[serde(rename = "rollup.execution.phase_started")]
    PhaseStarted(PhaseStartedEvent),
    #[serde(rename = "rollup.execution.phase_completed")]
    PhaseCompleted(PhaseCompletedEvent),
    #[serde(rename = "rollup.execution.progress")]
    ExecutionProgress(ExecutionProgressEvent),
    #[serde(rename = "rollup.matching.completed")]
    MatchingCompleted(MatchingCompletedEvent),
    #[serde(rename = "rollup.merge.conflict")]
    MergeConflict(MergeConflictEvent),
    #[serde(rename = "rollup.merge.completed")]
    MergeCompleted(MergeCompletedEvent),
    #[serde(rename = "rollup.execution.completed")]
    ExecutionCompleted(ExecutionCompletedEvent),
    #[serde(rename = "rollup.execution.failed")]
    ExecutionFailed(ExecutionFailedEvent),
    #[serde(rename = "rollup.execution.cancelled")]
    ExecutionCancelled(ExecutionCancelledEvent),
    #[serde(rename = "rollup.execution.timed_out")]
    ExecutionTimedOut(ExecutionTimedOutEvent),
    #[serde(rename = "rollup.execution.retrying")]
    ExecutionRetrying(ExecutionRetryingEvent),
}

impl EventPayload {
    pub fn event_type(&self) -> RollupEventType {
        match self {
            Self::ConfigurationCreated(_) => RollupEventType::ConfigurationCreated,
            Self::ConfigurationUpdated(_) => RollupEventType::ConfigurationUpdated,
            Self::ConfigurationDeleted(_) => RollupEventType::ConfigurationDeleted,
            Self::ExecutionStarted(_) => RollupEventType::ExecutionStarted,
            Self::PhaseStarted(_) => RollupEventType::PhaseStarted,
            Self::PhaseCompleted(_) => RollupEventType::PhaseCompleted,
            Self::ExecutionProgress(_) => RollupEventType::ExecutionProgress,
            Self::MatchingCompleted(_) => RollupEventType::MatchingCompleted,
            Self::MergeConflict(_) => RollupEventType::MergeConflict,
            Self::MergeCompleted(_) => RollupEventType::MergeCompleted,
            Self::ExecutionCompleted(_) => RollupEventType::ExecutionCompleted,
            Self::ExecutionFailed(_) => RollupEventType::ExecutionFailed,
            Self::ExecutionCancelled(_) => RollupEventType::ExecutionCancelled,
            Self::ExecutionTimedOut(_) => RollupEventType::ExecutionTimedOut,
            Self::ExecutionRetrying(_) => RollupEventType::ExecutionRetrying,
        }
    }

    /// Execution the event belongs to, if any.
    pub fn execution_id(&self) -> Option<&str> {
        match self {
            Self::ConfigurationCreated(_)
            | Self::ConfigurationUpdated(_)
            | Self::ConfigurationDeleted(_) => None,
            Self::ExecutionStarted(e) => Some(&e.execution_id),
            Self::PhaseStarted(e) => Some(&e.execution_id),
            Self::PhaseCompleted(e) => Some(&e.execution_id),
            Self::ExecutionProgress(e) => Some(&e.execution_id),
            Self::MatchingCompleted(e) => Some(&e.execution_id),
            Self::MergeConflict(e) => Some(&e.execution_id),
            Self::MergeCompleted(e) => Some(&e.execution_id),
            Self::ExecutionCompleted(e) => Some(&e.execution_id),
            Self::ExecutionFailed(e) => Some(&e.execution_id),
            Self::ExecutionCancelled(e) => Some(&e.execution_id),
            Self::ExecutionTimedOut(e) => Some(&e.execution_id),
            Self::ExecutionRetrying(e) => Some(&e.execution_id),
        }
    }
}
