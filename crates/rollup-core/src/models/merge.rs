//! Merge output: aggregate nodes built from matched components, plus the
//! remapped edge set over them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::matching::MatchStrategy;
use crate::types::graph::{Metadata, NodeKey, NodeLocation, ScopedNode};

/// A location retained from one contributing source node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub repository_id: String,
    pub node_id: String,
    pub location: NodeLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeProvenance {
    pub contributing_nodes: Vec<NodeKey>,
    pub merged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    /// Most frequent strategy among the component's matches.
    pub strategy: MatchStrategy,
    /// Weakest accepted match confidence in the component.
    pub confidence: u32,
    pub source_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedNode {
    pub id: String,
    /// Contributing nodes in `(repository_id, node_id)` order. Never empty.
    pub sources: Vec<NodeKey>,
    /// Distinct repositories, sorted.
    pub repository_ids: Vec<String>,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub locations: Vec<SourceLocation>,
    pub metadata: Metadata,
    pub provenance: MergeProvenance,
    pub match_info: MatchInfo,
}

impl MergedNode {
    pub fn source_node_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|k| k.node_id.as_str()).collect()
    }
}

/// Edge of the aggregate graph; endpoints are aggregate node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub confidence: f64,
    pub implicit: bool,
    #[serde(default)]
    pub metadata: Metadata,
    /// Repository the original edge was declared in.
    pub repository_id: String,
    pub original_edge_id: String,
    pub cross_repo: bool,
}

/// A field on which the sources of one component disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConflict {
    pub field: String,
    pub values: Vec<(NodeKey, serde_json::Value)>,
}

/// A component that could not be merged under the `error` policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeConflict {
    pub component: Vec<NodeKey>,
    pub fields: Vec<FieldConflict>,
}

/// The persisted result of one execution: merged nodes, unmatched nodes kept
/// as-is, and the edge set remapped onto aggregate ids.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedGraph {
    pub merged_nodes: Vec<MergedNode>,
    pub passthrough_nodes: Vec<ScopedNode>,
    pub edges: Vec<AggregateEdge>,
    #[serde(default)]
    pub conflicts: Vec<MergeConflict>,
}

/// Aggregate id of an unmerged node.
pub fn passthrough_id(key: &NodeKey) -> String {
    key.to_string()
}

impl MergedGraph {
    pub fn node_count(&self) -> usize {
        self.merged_nodes.len() + self.passthrough_nodes.len()
    }
}
