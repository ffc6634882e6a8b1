//! RollupExecution: the persisted projection of one execution's event log.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal phases of a running execution, in their only legal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Loading,
    Matching,
    Merging,
    Storing,
}

impl ExecutionPhase {
    pub const ALL: [ExecutionPhase; 4] = [Self::Loading, Self::Matching, Self::Merging, Self::Storing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Matching => "matching",
            Self::Merging => "merging",
            Self::Storing => "storing",
        }
    }

    /// Overall-progress band `[start, end)` occupied by this phase.
    pub fn progress_band(&self) -> (u8, u8) {
        match self {
            Self::Loading => (0, 25),
            Self::Matching => (25, 60),
            Self::Merging => (60, 85),
            Self::Storing => (85, 100),
        }
    }

    pub fn next(&self) -> Option<ExecutionPhase> {
        match self {
            Self::Loading => Some(Self::Matching),
            Self::Matching => Some(Self::Merging),
            Self::Merging => Some(Self::Storing),
            Self::Storing => None,
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a terminal execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTiming {
    pub phase: ExecutionPhase,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupExecutionStats {
    pub nodes_processed: u64,
    pub edges_processed: u64,
    pub matched_nodes: u64,
    pub unmatched_nodes: u64,
    pub merged_nodes: u64,
    pub cross_repo_edges_created: u64,
    pub merge_conflicts: u64,
    pub matches_by_strategy: BTreeMap<String, u64>,
    pub nodes_by_type: BTreeMap<String, u64>,
    pub edges_by_type: BTreeMap<String, u64>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_peak_bytes: Option<u64>,
}

/// Failure record attached to a failed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ExecutionPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupExecution {
    pub id: String,
    pub rollup_id: String,
    pub tenant_id: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ExecutionPhase>,
    pub progress_percent: u8,
    /// Scan actually used per repository.
    #[serde(default)]
    pub scan_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub phase_timings: Vec<PhaseTiming>,
    #[serde(default)]
    pub stats: RollupExecutionStats,
    #[serde(default)]
    pub include_match_details: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,
    /// 1-based attempt number within a retry chain.
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retried_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RollupExecution {
    /// A fresh `pending` execution.
    pub fn pending(
        id: impl Into<String>,
        rollup_id: impl Into<String>,
        tenant_id: impl Into<String>,
        attempt: u32,
    ) -> Self {
        Self {
            id: id.into(),
            rollup_id: rollup_id.into(),
            tenant_id: tenant_id.into(),
            status: ExecutionStatus::Pending,
            phase: None,
            progress_percent: 0,
            scan_ids: BTreeMap::new(),
            phase_timings: Vec::new(),
            stats: RollupExecutionStats::default(),
            include_match_details: false,
            error: None,
            termination: None,
            attempt,
            retry_of: None,
            retried_by: None,
            triggered_by: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Per-request overrides for `execute`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOverrides {
    #[serde(default)]
    pub scan_ids: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub force: bool,
    #[serde(default, rename = "async")]
    pub run_async: bool,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub include_match_details: bool,
    #[serde(default)]
    pub triggered_by: Option<String>,
}

/// What `execute` hands back. `execution` is filled in synchronous mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionHandle {
    pub execution_id: String,
    pub rollup_id: String,
    pub status: ExecutionStatus,
    pub execution: Option<RollupExecution>,
}
