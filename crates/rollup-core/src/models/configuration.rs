//! RollupConfiguration and its create/update inputs.
//!
//! A configuration is only ever mutated through a validated update that
//! carries the caller's view of `version`; the store rejects stale versions
//! and bumps `version` by exactly one on success.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::matcher::MatcherConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupStatus {
    #[default]
    Draft,
    Active,
    Executing,
    Completed,
    Failed,
    Archived,
}

impl RollupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "executing" => Some(Self::Executing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Whether a caller-requested status change is allowed. `executing` is owned
    /// by the executor and cannot be entered or left through a plain update.
    pub fn can_transition_to(&self, next: RollupStatus) -> bool {
        use RollupStatus::*;
        if *self == next {
            return true;
        }
        match (self, next) {
            (Executing, _) | (_, Executing) => false,
            (Archived, Draft) | (Archived, Active) => true,
            (Archived, _) => false,
            (_, Archived) => true,
            (Draft, Active) => true,
            (Active, Draft) => true,
            (Completed, Active) | (Failed, Active) => true,
            (Completed, Draft) | (Failed, Draft) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RollupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    #[default]
    First,
    Last,
    Merge,
    Error,
}

/// How the `merge` policy treats conflicting fields inside nested objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedMergePolicy {
    /// Shallow merge: the first source's value wins per nested field.
    #[default]
    FirstWins,
    /// Apply the merge rules recursively to nested objects.
    Deep,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
    /// Keep unmatched nodes visible in the aggregate graph.
    #[serde(default = "default_true")]
    pub preserve_source_info: bool,
    #[serde(default = "default_true")]
    pub create_cross_repo_edges: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<usize>,
    /// Escalate `error`-policy conflicts into a failed merge phase.
    #[serde(default)]
    pub fail_on_conflict: bool,
    #[serde(default)]
    pub nested_merge: NestedMergePolicy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::First,
            preserve_source_info: true,
            create_cross_repo_edges: true,
            max_nodes: None,
            fail_on_conflict: false,
            nested_merge: NestedMergePolicy::FirstWins,
        }
    }
}

/// Node-type include/exclude filters. At most one side should name a given type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl NodeTypeFilter {
    pub fn accepts(&self, node_type: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|t| t == node_type) {
            return false;
        }
        !self.exclude.iter().any(|t| t == node_type)
    }

    /// Types named on both sides.
    pub fn overlap(&self) -> Vec<String> {
        let mut overlap: Vec<String> = self
            .include
            .iter()
            .filter(|t| self.exclude.contains(t))
            .cloned()
            .collect();
        overlap.sort();
        overlap.dedup();
        overlap
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default)]
    pub on_scan_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupConfiguration {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: RollupStatus,
    pub repository_ids: Vec<String>,
    /// Fixed scan per repository; repositories absent here use their latest scan.
    #[serde(default)]
    pub scan_ids: BTreeMap<String, String>,
    pub matchers: Vec<MatcherConfig>,
    #[serde(default)]
    pub node_type_filter: NodeTypeFilter,
    #[serde(default)]
    pub merge_options: MergeOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<RollupSchedule>,
    pub version: u64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl RollupConfiguration {
    pub fn enabled_matchers(&self) -> impl Iterator<Item = &MatcherConfig> {
        self.matchers.iter().filter(|m| m.is_enabled())
    }
}

/// Serialize a configuration to its JSON wire form.
pub fn rollup_config_to_json(config: &RollupConfiguration) -> Result<String, serde_json::Error> {
    serde_json::to_string(config)
}

/// Parse a configuration from its JSON wire form.
pub fn rollup_config_from_json(json: &str) -> Result<RollupConfiguration, serde_json::Error> {
    serde_json::from_str(json)
}

/// Input for creating a configuration. Ids, version and audit fields are assigned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRollupInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub repository_ids: Vec<String>,
    #[serde(default)]
    pub scan_ids: BTreeMap<String, String>,
    pub matchers: Vec<MatcherConfig>,
    #[serde(default)]
    pub node_type_filter: NodeTypeFilter,
    #[serde(default)]
    pub merge_options: MergeOptions,
    #[serde(default)]
    pub schedule: Option<RollupSchedule>,
    /// Start `active` instead of `draft`.
    #[serde(default)]
    pub activate: bool,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRollupInput {
    pub expected_version: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<RollupStatus>,
    #[serde(default)]
    pub repository_ids: Option<Vec<String>>,
    #[serde(default)]
    pub scan_ids: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub matchers: Option<Vec<MatcherConfig>>,
    #[serde(default)]
    pub node_type_filter: Option<NodeTypeFilter>,
    #[serde(default)]
    pub merge_options: Option<MergeOptions>,
    #[serde(default)]
    pub schedule: Option<Option<RollupSchedule>>,
}

impl UpdateRollupInput {
    /// Names of the fields this update touches, for the `updated` event.
    pub fn changed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        let mut push = |set: bool, name: &str| {
            if set {
                fields.push(name.to_string());
            }
        };
        push(self.name.is_some(), "name");
        push(self.description.is_some(), "description");
        push(self.status.is_some(), "status");
        push(self.repository_ids.is_some(), "repositoryIds");
        push(self.scan_ids.is_some(), "scanIds");
        push(self.matchers.is_some(), "matchers");
        push(self.node_type_filter.is_some(), "nodeTypeFilter");
        push(self.merge_options.is_some(), "mergeOptions");
        push(self.schedule.is_some(), "schedule");
        fields
    }

    /// Apply the patch onto a copy of `current`. Version and audit fields are left to the caller.
    pub fn apply_to(&self, current: &RollupConfiguration) -> RollupConfiguration {
        let mut next = current.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(repos) = &self.repository_ids {
            next.repository_ids = repos.clone();
        }
        if let Some(scans) = &self.scan_ids {
            next.scan_ids = scans.clone();
        }
        if let Some(matchers) = &self.matchers {
            next.matchers = matchers.clone();
        }
        if let Some(filter) = &self.node_type_filter {
            next.node_type_filter = filter.clone();
        }
        if let Some(options) = &self.merge_options {
            next.merge_options = options.clone();
        }
        if let Some(schedule) = &self.schedule {
            next.schedule = schedule.clone();
        }
        next
    }
}

/// Listing filter with offset paging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigurationFilter {
    pub tenant_id: Option<String>,
    pub status: Option<RollupStatus>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ConfigurationFilter {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, config: &RollupConfiguration) -> bool {
        self.tenant_id.as_ref().map_or(true, |t| *t == config.tenant_id)
            && self.status.map_or(true, |s| s == config.status)
    }
}
