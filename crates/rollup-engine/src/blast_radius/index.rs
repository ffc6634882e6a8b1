//! Petgraph index over a stored merged graph.

use petgraph::graph::{DiGraph, NodeIndex};
use rollup_core::models::{passthrough_id, MergedGraph};
use rollup_core::{FxHashMap, RollupError, RollupResult};
use tracing::warn;

/// Node weight: what the traversal reports about an aggregate node.
#[derive(Debug, Clone)]
pub struct IndexedNode {
    pub id: String,
    pub node_type: String,
    pub name: String,
    /// Sorted, distinct.
    pub repository_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IndexedEdge {
    pub edge_type: String,
    pub cross_repo: bool,
}

/// Aggregate graph of one completed execution. Immutable once built.
pub struct GraphIndex {
    pub graph: DiGraph<IndexedNode, IndexedEdge>,
    by_id: FxHashMap<String, NodeIndex>,
    /// Original per-repository node id → aggregate nodes it ended up in.
    by_source_node: FxHashMap<String, Vec<NodeIndex>>,
}

impl GraphIndex {
    pub fn build(merged: &MergedGraph) -> Self {
        let mut graph = DiGraph::with_capacity(merged.node_count(), merged.edges.len());
        let mut by_id = FxHashMap::default();
        let mut by_source_node: FxHashMap<String, Vec<NodeIndex>> = FxHashMap::default();

        for node in &merged.merged_nodes {
            let idx = graph.add_node(IndexedNode {
                id: node.id.clone(),
                node_type: node.node_type.clone(),
                name: node.name.clone(),
                repository_ids: node.repository_ids.clone(),
            });
            by_id.insert(node.id.clone(), idx);
            for source in &node.sources {
                by_source_node
                    .entry(source.node_id.clone())
                    .or_default()
                    .push(idx);
            }
        }
        for scoped in &merged.passthrough_nodes {
            let id = passthrough_id(&scoped.key());
            let idx = graph.add_node(IndexedNode {
                id: id.clone(),
                node_type: scoped.node.node_type.clone(),
                name: scoped.node.name.clone(),
                repository_ids: vec![scoped.repository_id.clone()],
            });
            by_id.insert(id, idx);
            by_source_node
                .entry(scoped.node.id.clone())
                .or_default()
                .push(idx);
        }
        for edge in &merged.edges {
            let (Some(&source), Some(&target)) = (by_id.get(&edge.source), by_id.get(&edge.target))
            else {
                continue;
            };
            graph.add_edge(
                source,
                target,
                IndexedEdge {
                    edge_type: edge.edge_type.clone(),
                    cross_repo: edge.cross_repo,
                },
            );
        }

        Self {
            graph,
            by_id,
            by_source_node,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn get(&self, aggregate_id: &str) -> Option<NodeIndex> {
        self.by_id.get(aggregate_id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &IndexedNode {
        &self.graph[idx]
    }

    /// Resolve seed ids: an aggregate id wins, otherwise every aggregate node
    /// built from a source node with that id. Order of first appearance, no
    /// duplicates.
    ///
    /// An original node id is not scoped by repository. When several
    /// repositories use the same id, all of their nodes become seeds and a
    /// warning is logged; pass the aggregate id (`repository::node`) to pick
    /// one.
    pub fn resolve_seeds(&self, execution_id: &str, seeds: &[String]) -> RollupResult<Vec<NodeIndex>> {
        let mut resolved: Vec<NodeIndex> = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let candidates: &[NodeIndex] = match self.by_id.get(seed) {
                Some(idx) => std::slice::from_ref(idx),
                None => {
                    let matches = self
                        .by_source_node
                        .get(seed)
                        .map(Vec::as_slice)
                        .ok_or_else(|| RollupError::NodeNotFound {
                            execution_id: execution_id.to_string(),
                            node_id: seed.clone(),
                        })?;
                    if matches.len() > 1 {
                        warn!(
                            %execution_id,
                            seed = %seed,
                            aggregates = ?matches.iter().map(|&i| self.graph[i].id.as_str()).collect::<Vec<_>>(),
                            "seed id is ambiguous across repositories, using every match"
                        );
                    }
                    matches
                }
            };
            for idx in candidates {
                if !resolved.contains(idx) {
                    resolved.push(*idx);
                }
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use rollup_core::{GraphNode, ScopedNode};

    use super::*;

    fn passthrough(repository_id: &str, node_id: &str) -> ScopedNode {
        ScopedNode::new(repository_id, GraphNode::new(node_id, "resource", node_id))
    }

    #[test]
    fn shared_original_id_seeds_every_repository() {
        let merged = MergedGraph {
            passthrough_nodes: vec![passthrough("repo-a", "main"), passthrough("repo-b", "main")],
            ..MergedGraph::default()
        };
        let index = GraphIndex::build(&merged);

        let both = index.resolve_seeds("e1", &["main".to_string()]).unwrap();
        assert_eq!(both.len(), 2);

        let scoped = passthrough_id(&passthrough("repo-b", "main").key());
        let one = index.resolve_seeds("e1", &[scoped.clone()]).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(index.node(one[0]).id, scoped);
    }
}
