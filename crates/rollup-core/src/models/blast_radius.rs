//! Blast radius query and result types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on `max_depth`.
pub const MAX_BLAST_RADIUS_DEPTH: u32 = 20;

/// Per-depth weight applied when summing the impact score.
pub const DECAY_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    /// Follow edges from source to target: what depends on a seed's dependents.
    #[default]
    Downstream,
    Upstream,
    Both,
}

fn default_true() -> bool {
    true
}

fn default_depth() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlastRadiusQuery {
    /// Aggregate ids, or original per-repository node ids.
    pub seed_node_ids: Vec<String>,
    #[serde(default = "default_depth")]
    pub max_depth: u32,
    /// Empty means every edge type.
    #[serde(default)]
    pub edge_types: Vec<String>,
    #[serde(default = "default_true")]
    pub include_cross_repo: bool,
    #[serde(default = "default_true")]
    pub include_indirect: bool,
    #[serde(default)]
    pub direction: TraversalDirection,
}

impl BlastRadiusQuery {
    pub fn new(seed_node_ids: Vec<String>) -> Self {
        Self {
            seed_node_ids,
            max_depth: default_depth(),
            edge_types: Vec::new(),
            include_cross_repo: true,
            include_indirect: true,
            direction: TraversalDirection::Downstream,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn accepts_edge_type(&self, edge_type: &str) -> bool {
        self.edge_types.is_empty() || self.edge_types.iter().any(|t| t == edge_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactedNode {
    pub node_id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub repository_ids: Vec<String>,
    pub depth: u32,
    /// Aggregate ids from the nearest seed to this node, both inclusive.
    pub path: Vec<String>,
    pub via_edge_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossRepoImpact {
    pub source_repository_id: String,
    pub target_repository_id: String,
    pub edge_type: String,
    pub impacted_node_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlastRadiusSummary {
    pub total_impacted: usize,
    pub direct_count: usize,
    pub indirect_count: usize,
    pub cross_repo_count: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_repository: BTreeMap<String, usize>,
    pub by_depth: BTreeMap<u32, usize>,
    pub risk_level: RiskLevel,
    pub impact_score: f64,
}

impl BlastRadiusSummary {
    pub fn empty() -> Self {
        Self {
            total_impacted: 0,
            direct_count: 0,
            indirect_count: 0,
            cross_repo_count: 0,
            by_type: BTreeMap::new(),
            by_repository: BTreeMap::new(),
            by_depth: BTreeMap::new(),
            risk_level: RiskLevel::Low,
            impact_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlastRadiusResult {
    pub rollup_id: String,
    pub execution_id: String,
    /// Seeds resolved to aggregate ids.
    pub seed_node_ids: Vec<String>,
    pub direct_impact: Vec<ImpactedNode>,
    pub indirect_impact: Vec<ImpactedNode>,
    pub cross_repo_impact: Vec<CrossRepoImpact>,
    pub summary: BlastRadiusSummary,
}
