//! Per-repository graph model produced by the IaC scanners.
//!
//! The scanners (Terraform, Kubernetes, Helm, ArgoCD, Terragrunt) are external;
//! this module only describes the node/edge shape they hand to the rollup engine
//! and a few accessors for the metadata conventions the matchers rely on.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form node/edge metadata as emitted by the scanners.
pub type Metadata = Map<String, Value>;

/// Source position of a node inside its repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLocation {
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// A resource, module or workload discovered in one repository scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<NodeLocation>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: name.into(),
            location: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        self.location = Some(NodeLocation {
            file: file.into(),
            start_line,
            end_line,
        });
        self
    }

    /// Resolve a dotted attribute path (`attributes.bucket_id`) against the metadata.
    pub fn attribute(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut current = self.metadata.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Attribute rendered as a string. Numbers and booleans are stringified;
    /// objects, arrays and nulls yield `None`.
    pub fn attribute_str(&self, path: &str) -> Option<String> {
        value_as_string(self.attribute(path)?)
    }

    fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|k| self.metadata.get(*k).and_then(Value::as_str))
    }

    /// Cloud resource type (`aws_s3_bucket`, `Deployment`, ...).
    pub fn resource_type(&self) -> Option<&str> {
        self.first_str(&["resourceType", "resource_type"])
    }

    pub fn provider(&self) -> Option<&str> {
        self.first_str(&["provider"])
    }

    pub fn namespace(&self) -> Option<&str> {
        self.first_str(&["namespace"])
    }

    /// The node's ARN: the `arn` metadata attribute, or the id itself when it is an ARN.
    pub fn arn(&self) -> Option<&str> {
        self.first_str(&["arn"])
            .or_else(|| self.id.starts_with("arn:").then_some(self.id.as_str()))
    }

    /// Tags (Terraform) or labels (Kubernetes).
    pub fn tags(&self) -> Option<&Map<String, Value>> {
        ["tags", "labels"]
            .iter()
            .find_map(|k| self.metadata.get(*k).and_then(Value::as_object))
    }
}

/// Render a scalar JSON value as a comparable string.
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A dependency or reference between two nodes of the same scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub implicit: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GraphEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            edge_type: edge_type.into(),
            confidence: 1.0,
            implicit: false,
            metadata: Metadata::new(),
        }
    }
}

/// The node and edge sets of one repository at one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryGraph {
    pub repository_id: String,
    pub scan_id: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Globally unique identity of a source node: node ids are only unique inside
/// their repository. Ordering is `(repository_id, node_id)`, which is the
/// canonical source order used by conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeKey {
    pub repository_id: String,
    pub node_id: String,
}

impl NodeKey {
    pub fn new(repository_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            node_id: node_id.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.repository_id, self.node_id)
    }
}

/// A node tagged with the repository it was loaded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedNode {
    pub repository_id: String,
    pub node: GraphNode,
}

impl ScopedNode {
    pub fn new(repository_id: impl Into<String>, node: GraphNode) -> Self {
        Self {
            repository_id: repository_id.into(),
            node,
        }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.repository_id.clone(), self.node.id.clone())
    }
}

/// An edge tagged with the repository it was declared in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedEdge {
    pub repository_id: String,
    pub edge: GraphEdge,
}

impl ScopedEdge {
    pub fn new(repository_id: impl Into<String>, edge: GraphEdge) -> Self {
        Self {
            repository_id: repository_id.into(),
            edge,
        }
    }
}
