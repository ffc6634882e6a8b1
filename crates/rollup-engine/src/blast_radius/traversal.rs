//! Multi-source BFS over the aggregate graph.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rollup_core::models::{BlastRadiusQuery, TraversalDirection};
use rollup_core::{FxHashMap, FxHashSet};

use super::index::GraphIndex;

/// A node reached from the seed set at its shortest depth.
#[derive(Debug, Clone)]
pub struct Reached {
    pub node: NodeIndex,
    pub depth: u32,
    /// Seed first, `node` last.
    pub path: Vec<NodeIndex>,
    pub via_edge_type: String,
}

/// `(source repo, target repo, edge type)`.
pub type CrossRepoKey = (String, String, String);

#[derive(Debug, Default)]
pub struct Traversal {
    /// BFS order: nondecreasing depth.
    pub reached: Vec<Reached>,
    /// Distinct impacted nodes per cross-repo triple.
    pub cross_repo: BTreeMap<CrossRepoKey, BTreeSet<NodeIndex>>,
}

struct Step {
    neighbor: NodeIndex,
    edge: EdgeIndex,
}

fn directions(direction: TraversalDirection) -> &'static [Direction] {
    match direction {
        TraversalDirection::Downstream => &[Direction::Outgoing],
        TraversalDirection::Upstream => &[Direction::Incoming],
        TraversalDirection::Both => &[Direction::Outgoing, Direction::Incoming],
    }
}

/// An edge crosses repositories when it was emitted as cross-repo or its
/// endpoints come from different repository sets.
fn is_crossing(index: &GraphIndex, from: NodeIndex, to: NodeIndex, edge: EdgeIndex) -> bool {
    index.graph[edge].cross_repo
        || index.node(from).repository_ids != index.node(to).repository_ids
}

/// Qualifying neighbours of `node`, sorted by aggregate id then edge type so
/// the traversal is independent of insertion order.
fn steps(index: &GraphIndex, node: NodeIndex, query: &BlastRadiusQuery) -> Vec<Step> {
    let mut steps = Vec::new();
    for &direction in directions(query.direction) {
        for edge in index.graph.edges_directed(node, direction) {
            let neighbor = match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            };
            if neighbor == node || !query.accepts_edge_type(&edge.weight().edge_type) {
                continue;
            }
            if !query.include_cross_repo && is_crossing(index, node, neighbor, edge.id()) {
                continue;
            }
            steps.push(Step {
                neighbor,
                edge: edge.id(),
            });
        }
    }
    steps.sort_by(|a, b| {
        let ka = (&index.node(a.neighbor).id, &index.graph[a.edge].edge_type);
        let kb = (&index.node(b.neighbor).id, &index.graph[b.edge].edge_type);
        ka.cmp(&kb)
    });
    steps
}

pub fn traverse(index: &GraphIndex, seeds: &[NodeIndex], query: &BlastRadiusQuery) -> Traversal {
    let max_depth = if query.include_indirect {
        query.max_depth
    } else {
        query.max_depth.min(1)
    };
    let mut traversal = Traversal::default();
    if max_depth == 0 {
        return traversal;
    }

    let seed_set: FxHashSet<NodeIndex> = seeds.iter().copied().collect();
    // node → (parent, edge) on its shortest path
    let mut parent: FxHashMap<NodeIndex, (NodeIndex, EdgeIndex)> = FxHashMap::default();
    let mut visited: FxHashSet<NodeIndex> = seed_set.clone();
    let mut queue: VecDeque<(NodeIndex, u32)> = seeds.iter().map(|&s| (s, 0)).collect();

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for step in steps(index, node, query) {
            if seed_set.contains(&step.neighbor) {
                continue;
            }
            if is_crossing(index, node, step.neighbor, step.edge) {
                let edge_type = &index.graph[step.edge].edge_type;
                for from_repo in &index.node(node).repository_ids {
                    for to_repo in &index.node(step.neighbor).repository_ids {
                        if from_repo != to_repo {
                            traversal
                                .cross_repo
                                .entry((from_repo.clone(), to_repo.clone(), edge_type.clone()))
                                .or_default()
                                .insert(step.neighbor);
                        }
                    }
                }
            }
            if visited.insert(step.neighbor) {
                parent.insert(step.neighbor, (node, step.edge));
                traversal.reached.push(Reached {
                    node: step.neighbor,
                    depth: depth + 1,
                    path: path_to(&parent, step.neighbor),
                    via_edge_type: index.graph[step.edge].edge_type.clone(),
                });
                queue.push_back((step.neighbor, depth + 1));
            }
        }
    }
    traversal
}

fn path_to(parent: &FxHashMap<NodeIndex, (NodeIndex, EdgeIndex)>, node: NodeIndex) -> Vec<NodeIndex> {
    let mut path = vec![node];
    let mut current = node;
    while let Some(&(previous, _)) = parent.get(&current) {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}
