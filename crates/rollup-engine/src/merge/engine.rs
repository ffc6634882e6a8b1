//! Merge engine: components → `MergedNode`s, unmatched passthrough, and edge
//! remapping onto aggregate ids.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rollup_core::models::{
    passthrough_id, AggregateEdge, ConflictResolution, MatchInfo, MatchResult, MatchStrategy,
    MergeConflict, MergeOptions, MergeProvenance, MergedGraph, MergedNode, SourceLocation,
};
use rollup_core::{
    FxHashMap, FxHashSet, NodeKey, RollupError, RollupResult, ScopedEdge, ScopedNode,
};
use tracing::{debug, warn};

use super::components::matched_components;
use super::conflict::{resolve, Resolution};
use crate::control::PhaseControl;

/// Deterministic aggregate id of a component: `merged-` + 16 hex chars of
/// blake3 over the sorted member keys.
pub fn merged_node_id(members: &[&NodeKey]) -> String {
    let mut hasher = blake3::Hasher::new();
    for key in members {
        hasher.update(key.repository_id.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(key.node_id.as_bytes());
        hasher.update(&[0x1e]);
    }
    let hex = hasher.finalize().to_hex();
    format!("merged-{}", &hex.as_str()[..16])
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub graph: MergedGraph,
    /// Nodes belonging to a component of two or more.
    pub matched_nodes: usize,
    pub unmatched_nodes: usize,
    pub cross_repo_edges: usize,
}

impl MergeOutcome {
    /// Conflicts are reported, not fatal, unless `fail_on_conflict` is set.
    pub fn enforce_conflict_policy(&self, options: &MergeOptions) -> RollupResult<()> {
        if options.fail_on_conflict && !self.graph.conflicts.is_empty() {
            return Err(RollupError::MergeConflict {
                conflicts: self.graph.conflicts.len(),
            });
        }
        Ok(())
    }
}

pub struct MergeEngine<'o> {
    options: &'o MergeOptions,
    parallel: bool,
}

enum ComponentResult {
    Merged(MergedNode),
    Conflicted(MergeConflict),
}

impl<'o> MergeEngine<'o> {
    pub fn new(options: &'o MergeOptions) -> Self {
        Self {
            options,
            parallel: true,
        }
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    fn merge_component(
        &self,
        members: &[usize],
        nodes: &[ScopedNode],
        keys: &[NodeKey],
        component_matches: &[&MatchResult],
        merged_at: DateTime<Utc>,
    ) -> ComponentResult {
        let member_keys: Vec<&NodeKey> = members.iter().map(|&i| &keys[i]).collect();
        let sources: Vec<(&NodeKey, &rollup_core::Metadata)> = members
            .iter()
            .map(|&i| (&keys[i], &nodes[i].node.metadata))
            .collect();

        let metadata = match resolve(
            self.options.conflict_resolution,
            self.options.nested_merge,
            &sources,
        ) {
            Resolution::Resolved(metadata) => metadata,
            Resolution::Conflict(fields) => {
                return ComponentResult::Conflicted(MergeConflict {
                    component: member_keys.into_iter().cloned().collect(),
                    fields,
                })
            }
        };

        let representative = match self.options.conflict_resolution {
            ConflictResolution::Last => &nodes[members[members.len() - 1]].node,
            _ => &nodes[members[0]].node,
        };

        let mut repository_ids: Vec<String> =
            member_keys.iter().map(|k| k.repository_id.clone()).collect();
        repository_ids.sort();
        repository_ids.dedup();

        let locations = members
            .iter()
            .filter_map(|&i| {
                nodes[i].node.location.as_ref().map(|location| SourceLocation {
                    repository_id: keys[i].repository_id.clone(),
                    node_id: keys[i].node_id.clone(),
                    location: location.clone(),
                })
            })
            .collect();

        ComponentResult::Merged(MergedNode {
            id: merged_node_id(&member_keys),
            sources: member_keys.iter().map(|k| (*k).clone()).collect(),
            repository_ids,
            node_type: representative.node_type.clone(),
            name: representative.name.clone(),
            locations,
            metadata,
            provenance: MergeProvenance {
                contributing_nodes: member_keys.iter().map(|k| (*k).clone()).collect(),
                merged_at,
            },
            match_info: match_info(component_matches, members.len()),
        })
    }

    /// Merge `nodes` along `matches`. Cancellation is checked between components.
    pub fn run(
        &self,
        nodes: &[ScopedNode],
        edges: &[ScopedEdge],
        matches: &[MatchResult],
        merged_at: DateTime<Utc>,
        control: PhaseControl<'_>,
    ) -> RollupResult<MergeOutcome> {
        let keys: Vec<NodeKey> = nodes.iter().map(ScopedNode::key).collect();
        let components = matched_components(&keys, matches);

        // Matches grouped by the component of their source node.
        let mut component_of: FxHashMap<&NodeKey, usize> = FxHashMap::default();
        for (c, members) in components.iter().enumerate() {
            for &i in members {
                component_of.insert(&keys[i], c);
            }
        }
        let mut matches_per_component: Vec<Vec<&MatchResult>> = vec![Vec::new(); components.len()];
        for m in matches {
            if let Some(&c) = component_of.get(&m.source_key()) {
                matches_per_component[c].push(m);
            }
        }

        let total = components.len();
        let done = AtomicUsize::new(0);
        let process = |c: usize| -> RollupResult<ComponentResult> {
            control.checkpoint()?;
            let result = self.merge_component(
                &components[c],
                nodes,
                &keys,
                &matches_per_component[c],
                merged_at,
            );
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            control.report_fraction(finished, total);
            Ok(result)
        };
        let results: Vec<ComponentResult> = if self.parallel {
            (0..total).into_par_iter().map(process).collect::<RollupResult<_>>()?
        } else {
            (0..total).map(process).collect::<RollupResult<_>>()?
        };
        control.checkpoint()?;

        let mut merged_nodes = Vec::new();
        let mut conflicts = Vec::new();
        for result in results {
            match result {
                ComponentResult::Merged(node) => merged_nodes.push(node),
                ComponentResult::Conflicted(conflict) => {
                    warn!(
                        component = ?conflict.component,
                        fields = conflict.fields.len(),
                        "merge conflict, component left unmerged"
                    );
                    conflicts.push(conflict);
                }
            }
        }
        // Aggregate id for every surviving source node.
        let mut aggregate_of: FxHashMap<&NodeKey, String> = FxHashMap::default();
        let mut merged_ids: FxHashSet<String> = FxHashSet::default();
        for node in &merged_nodes {
            merged_ids.insert(node.id.clone());
        }
        let member_of_merged: FxHashMap<&NodeKey, &str> = merged_nodes
            .iter()
            .flat_map(|n| n.sources.iter().map(move |k| (k, n.id.as_str())))
            .collect();
        let conflicted: FxHashSet<&NodeKey> = conflicts
            .iter()
            .flat_map(|c| c.component.iter())
            .collect();

        let matched_nodes: usize = components.iter().map(Vec::len).sum();
        let mut passthrough_nodes = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            if let Some(id) = member_of_merged.get(key) {
                aggregate_of.insert(key, (*id).to_string());
            } else if conflicted.contains(key) || self.options.preserve_source_info {
                aggregate_of.insert(key, passthrough_id(key));
                passthrough_nodes.push(nodes[i].clone());
            }
        }

        let node_count = merged_nodes.len() + passthrough_nodes.len();
        if let Some(limit) = self.options.max_nodes {
            if node_count > limit {
                return Err(RollupError::MaxNodesExceeded {
                    limit,
                    actual: node_count,
                });
            }
        }

        let edges = self.remap_edges(edges, &aggregate_of, &merged_ids);
        let cross_repo_edges = edges.iter().filter(|e| e.cross_repo).count();
        debug!(
            merged = merged_nodes.len(),
            passthrough = passthrough_nodes.len(),
            edges = edges.len(),
            cross_repo_edges,
            "merge complete"
        );
        control.report(100);

        Ok(MergeOutcome {
            graph: MergedGraph {
                merged_nodes,
                passthrough_nodes,
                edges,
                conflicts,
            },
            matched_nodes,
            unmatched_nodes: keys.len() - matched_nodes,
            cross_repo_edges,
        })
    }

    /// Re-point edges at aggregate ids. Self-loops created by merging are
    /// dropped; parallel edges of one type collapse into the first, keeping
    /// the highest confidence.
    fn remap_edges(
        &self,
        edges: &[ScopedEdge],
        aggregate_of: &FxHashMap<&NodeKey, String>,
        merged_ids: &FxHashSet<String>,
    ) -> Vec<AggregateEdge> {
        let mut sorted: Vec<&ScopedEdge> = edges.iter().collect();
        sorted.sort_by(|a, b| (&a.repository_id, &a.edge.id).cmp(&(&b.repository_id, &b.edge.id)));

        let mut by_endpoints: BTreeMap<(String, String, String), AggregateEdge> = BTreeMap::new();
        for scoped in sorted {
            let edge = &scoped.edge;
            let source_key = NodeKey::new(scoped.repository_id.clone(), edge.source.clone());
            let target_key = NodeKey::new(scoped.repository_id.clone(), edge.target.clone());
            let (Some(source), Some(target)) =
                (aggregate_of.get(&source_key), aggregate_of.get(&target_key))
            else {
                continue;
            };
            if source == target {
                continue;
            }
            let touches_merged = merged_ids.contains(source) || merged_ids.contains(target);
            let cross_repo = self.options.create_cross_repo_edges && touches_merged;

            by_endpoints
                .entry((source.clone(), target.clone(), edge.edge_type.clone()))
                .and_modify(|existing| {
                    existing.confidence = existing.confidence.max(edge.confidence);
                    existing.implicit &= edge.implicit;
                })
                .or_insert_with(|| AggregateEdge {
                    id: format!("{}::{}", scoped.repository_id, edge.id),
                    source: source.clone(),
                    target: target.clone(),
                    edge_type: edge.edge_type.clone(),
                    confidence: edge.confidence,
                    implicit: edge.implicit,
                    metadata: edge.metadata.clone(),
                    repository_id: scoped.repository_id.clone(),
                    original_edge_id: edge.id.clone(),
                    cross_repo,
                });
        }
        by_endpoints.into_values().collect()
    }
}

/// Dominant strategy (most frequent, ties by strategy rank), weakest
/// confidence, and member count.
fn match_info(matches: &[&MatchResult], source_count: usize) -> MatchInfo {
    let mut counts: BTreeMap<MatchStrategy, usize> = BTreeMap::new();
    for m in matches {
        *counts.entry(m.strategy).or_default() += 1;
    }
    let strategy = counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then(a.tie_break_rank().cmp(&b.tie_break_rank())))
        .map(|(s, _)| s)
        .unwrap_or(MatchStrategy::Arn);
    let confidence = matches.iter().map(|m| m.confidence).min().unwrap_or(0);
    MatchInfo {
        strategy,
        confidence,
        source_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_id_is_stable_and_order_sensitive_to_content_only() {
        let a = NodeKey::new("r1", "a");
        let b = NodeKey::new("r2", "b");
        let id1 = merged_node_id(&[&a, &b]);
        let id2 = merged_node_id(&[&a, &b]);
        assert_eq!(id1, id2);
        assert!(id1.starts_with("merged-"));
        assert_eq!(id1.len(), "merged-".len() + 16);
        assert_ne!(id1, merged_node_id(&[&a, &NodeKey::new("r2", "c")]));
    }
}
