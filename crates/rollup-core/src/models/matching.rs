//! Match results produced by the matching phase and consumed by merging.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::graph::NodeKey;

/// The four matching strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Arn,
    ResourceId,
    Name,
    Tag,
}

impl MatchStrategy {
    pub const ALL: [MatchStrategy; 4] = [Self::Arn, Self::ResourceId, Self::Name, Self::Tag];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arn => "arn",
            Self::ResourceId => "resource_id",
            Self::Name => "name",
            Self::Tag => "tag",
        }
    }

    /// Final tie-break rank: arn > resource_id > name > tag.
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            Self::Arn => 4,
            Self::ResourceId => 3,
            Self::Name => 2,
            Self::Tag => 1,
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a single strategy scoring a candidate pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    /// 0–100.
    pub confidence: u32,
    pub matched_attribute: String,
    pub source_value: String,
    pub target_value: String,
}

/// The winning match for one candidate pair. Source is the smaller `(repo, node)` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub source_node_id: String,
    pub source_repository_id: String,
    pub target_node_id: String,
    pub target_repository_id: String,
    pub strategy: MatchStrategy,
    pub confidence: u32,
    pub matched_attribute: String,
    pub source_value: String,
    pub target_value: String,
}

impl MatchResult {
    pub fn source_key(&self) -> NodeKey {
        NodeKey::new(self.source_repository_id.clone(), self.source_node_id.clone())
    }

    pub fn target_key(&self) -> NodeKey {
        NodeKey::new(self.target_repository_id.clone(), self.target_node_id.clone())
    }
}
