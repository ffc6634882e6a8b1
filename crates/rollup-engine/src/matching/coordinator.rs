//! Matching coordinator: blocks the node set, scores every cross-repository
//! candidate pair with every enabled matcher, and keeps one winner per pair.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use rayon::prelude::*;
use rollup_core::config::MatchingConfig;
use rollup_core::models::{MatchResult, MatchScore};
use rollup_core::{RollupResult, ScopedNode};
use tracing::{debug, warn};

use super::blocking::{build_blocks, Block};
use super::strategy::PreparedMatcher;
use crate::control::PhaseControl;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchingOutcome {
    /// Winning results, sorted by `(source key, target key)`.
    pub matches: Vec<MatchResult>,
    /// Winning results per strategy name.
    pub matches_by_strategy: BTreeMap<String, u64>,
    pub blocks: usize,
    pub candidate_pairs: u64,
}

pub struct MatchingCoordinator<'m> {
    matchers: &'m [PreparedMatcher],
    config: MatchingConfig,
}

/// Ordering of two candidate results for the same pair: confidence, then
/// priority, then strategy rank. Greater wins.
fn compare(a: (&PreparedMatcher, &MatchScore), b: (&PreparedMatcher, &MatchScore)) -> Ordering {
    a.1.confidence
        .cmp(&b.1.confidence)
        .then(a.0.priority.cmp(&b.0.priority))
        .then(a.0.strategy.tie_break_rank().cmp(&b.0.strategy.tie_break_rank()))
        .then(b.0.index.cmp(&a.0.index))
}

impl<'m> MatchingCoordinator<'m> {
    pub fn new(matchers: &'m [PreparedMatcher], config: MatchingConfig) -> Self {
        Self { matchers, config }
    }

    /// Best accepted result for one pair, if any matcher accepts it.
    pub fn best_match(&self, a: &ScopedNode, b: &ScopedNode) -> Option<MatchResult> {
        // Source is always the smaller (repository, node) key.
        let (source, target) = if (a.repository_id.as_str(), a.node.id.as_str())
            <= (b.repository_id.as_str(), b.node.id.as_str())
        {
            (a, b)
        } else {
            (b, a)
        };

        let mut best: Option<(&PreparedMatcher, MatchScore)> = None;
        for matcher in self.matchers {
            let Some(score) = matcher.score(&source.node, &target.node) else {
                continue;
            };
            let better = match &best {
                Some((current, current_score)) => {
                    compare((matcher, &score), (*current, current_score)) == Ordering::Greater
                }
                None => true,
            };
            if better {
                best = Some((matcher, score));
            }
        }

        best.map(|(matcher, score)| MatchResult {
            source_node_id: source.node.id.clone(),
            source_repository_id: source.repository_id.clone(),
            target_node_id: target.node.id.clone(),
            target_repository_id: target.repository_id.clone(),
            strategy: matcher.strategy,
            confidence: score.confidence,
            matched_attribute: score.matched_attribute,
            source_value: score.source_value,
            target_value: score.target_value,
        })
    }

    fn match_block(&self, block: &Block, nodes: &[ScopedNode]) -> Vec<MatchResult> {
        block
            .candidate_pairs(nodes)
            .filter_map(|(i, j)| self.best_match(&nodes[i], &nodes[j]))
            .collect()
    }

    /// Run matching over `nodes`. Cancellation is checked between blocks.
    pub fn run(&self, nodes: &[ScopedNode], control: PhaseControl<'_>) -> RollupResult<MatchingOutcome> {
        let blocks = build_blocks(nodes);
        let candidate_pairs: u64 = blocks.iter().map(|b| b.candidate_count(nodes)).sum();
        debug!(blocks = blocks.len(), candidate_pairs, "matching blocks built");

        if self.config.warn_block_size > 0 {
            for block in blocks.iter().filter(|b| b.members.len() > self.config.warn_block_size) {
                warn!(
                    node_type = %block.key.node_type,
                    resource_type = %block.key.resource_type,
                    size = block.members.len(),
                    "oversized matching block"
                );
            }
        }

        let total = blocks.len();
        let done = AtomicUsize::new(0);
        let process = |block: &Block| -> RollupResult<Vec<MatchResult>> {
            control.checkpoint()?;
            let found = self.match_block(block, nodes);
            let finished = done.fetch_add(1, AtomicOrdering::Relaxed) + 1;
            control.report_fraction(finished, total);
            Ok(found)
        };

        let per_block: Vec<Vec<MatchResult>> = if self.config.parallel {
            blocks.par_iter().map(process).collect::<RollupResult<_>>()?
        } else {
            blocks.iter().map(process).collect::<RollupResult<_>>()?
        };
        control.checkpoint()?;

        let mut matches: Vec<MatchResult> = per_block.into_iter().flatten().collect();
        matches.sort_by(|a, b| {
            (&a.source_repository_id, &a.source_node_id, &a.target_repository_id, &a.target_node_id).cmp(&(
                &b.source_repository_id,
                &b.source_node_id,
                &b.target_repository_id,
                &b.target_node_id,
            ))
        });

        let mut matches_by_strategy = BTreeMap::new();
        for m in &matches {
            *matches_by_strategy
                .entry(m.strategy.as_str().to_string())
                .or_insert(0u64) += 1;
        }
        control.report(100);

        Ok(MatchingOutcome {
            matches,
            matches_by_strategy,
            blocks: total,
            candidate_pairs,
        })
    }
}
