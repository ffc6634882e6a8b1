//! Blast radius: which aggregate nodes a change at the seed nodes reaches,
//! how far, across which repository boundaries, and how risky that is.

mod index;
mod scoring;
mod traversal;

use std::sync::Arc;

use moka::sync::Cache;
use rollup_core::config::BlastRadiusConfig;
use rollup_core::models::{
    BlastRadiusQuery, BlastRadiusResult, BlastRadiusSummary, CrossRepoImpact, ImpactedNode,
    MergedGraph, MAX_BLAST_RADIUS_DEPTH,
};
use rollup_core::{RollupError, RollupResult};
use tracing::debug;

pub use index::{GraphIndex, IndexedEdge, IndexedNode};
pub use scoring::{classify_risk, impact_score};
pub use traversal::{traverse, Reached, Traversal};

/// Answers blast radius queries. Indexes are cached per execution id; a
/// completed execution's merged graph never changes.
pub struct BlastRadiusEngine {
    indexes: Cache<String, Arc<GraphIndex>>,
    default_max_depth: u32,
}

impl BlastRadiusEngine {
    pub fn new(config: &BlastRadiusConfig) -> Self {
        Self {
            indexes: Cache::new(config.cache_capacity),
            default_max_depth: config.default_max_depth.min(MAX_BLAST_RADIUS_DEPTH),
        }
    }

    /// A query over `seeds` with the configured default depth.
    pub fn query(&self, seeds: Vec<String>) -> BlastRadiusQuery {
        BlastRadiusQuery::new(seeds).with_max_depth(self.default_max_depth)
    }

    /// Cached index for `execution_id`, built from `load` on a miss.
    pub fn index_for(
        &self,
        execution_id: &str,
        load: impl FnOnce() -> RollupResult<MergedGraph>,
    ) -> RollupResult<Arc<GraphIndex>> {
        if let Some(index) = self.indexes.get(execution_id) {
            return Ok(index);
        }
        let index = Arc::new(GraphIndex::build(&load()?));
        debug!(
            execution_id,
            nodes = index.node_count(),
            edges = index.edge_count(),
            "indexed merged graph"
        );
        self.indexes.insert(execution_id.to_string(), Arc::clone(&index));
        Ok(index)
    }

    pub fn invalidate(&self, execution_id: &str) {
        self.indexes.invalidate(execution_id);
    }

    pub fn analyze(
        &self,
        index: &GraphIndex,
        rollup_id: &str,
        execution_id: &str,
        query: &BlastRadiusQuery,
    ) -> RollupResult<BlastRadiusResult> {
        validate_query(query)?;
        let seeds = index.resolve_seeds(execution_id, &query.seed_node_ids)?;
        let traversal = traverse(index, &seeds, query);

        let mut direct_impact = Vec::new();
        let mut indirect_impact = Vec::new();
        let mut summary = BlastRadiusSummary::empty();
        for reached in &traversal.reached {
            let node = index.node(reached.node);
            *summary.by_type.entry(node.node_type.clone()).or_default() += 1;
            for repository_id in &node.repository_ids {
                *summary.by_repository.entry(repository_id.clone()).or_default() += 1;
            }
            *summary.by_depth.entry(reached.depth).or_default() += 1;

            let impacted = ImpactedNode {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
                name: node.name.clone(),
                repository_ids: node.repository_ids.clone(),
                depth: reached.depth,
                path: reached.path.iter().map(|&i| index.node(i).id.clone()).collect(),
                via_edge_type: reached.via_edge_type.clone(),
            };
            if reached.depth == 1 {
                direct_impact.push(impacted);
            } else {
                indirect_impact.push(impacted);
            }
        }

        let cross_repo_impact: Vec<CrossRepoImpact> = traversal
            .cross_repo
            .into_iter()
            .map(|((source, target, edge_type), nodes)| CrossRepoImpact {
                source_repository_id: source,
                target_repository_id: target,
                edge_type,
                impacted_node_count: nodes.len(),
            })
            .collect();

        summary.direct_count = direct_impact.len();
        summary.indirect_count = indirect_impact.len();
        summary.total_impacted = summary.direct_count + summary.indirect_count;
        summary.cross_repo_count = cross_repo_impact.len();
        summary.impact_score = impact_score(traversal.reached.iter().map(|r| r.depth));
        summary.risk_level = classify_risk(summary.total_impacted, summary.cross_repo_count);

        debug!(
            execution_id,
            seeds = seeds.len(),
            impacted = summary.total_impacted,
            risk = %summary.risk_level,
            "blast radius computed"
        );

        Ok(BlastRadiusResult {
            rollup_id: rollup_id.to_string(),
            execution_id: execution_id.to_string(),
            seed_node_ids: seeds.iter().map(|&i| index.node(i).id.clone()).collect(),
            direct_impact,
            indirect_impact,
            cross_repo_impact,
            summary,
        })
    }
}

fn validate_query(query: &BlastRadiusQuery) -> RollupResult<()> {
    if query.seed_node_ids.is_empty() {
        return Err(RollupError::InvalidQuery(
            "at least one seed node is required".into(),
        ));
    }
    if query.max_depth > MAX_BLAST_RADIUS_DEPTH {
        return Err(RollupError::InvalidQuery(format!(
            "maxDepth {} exceeds {MAX_BLAST_RADIUS_DEPTH}",
            query.max_depth
        )));
    }
    Ok(())
}
