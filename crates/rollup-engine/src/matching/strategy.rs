//! Prepared matchers: configs compiled once (regexes, globs) and dispatched
//! through an exhaustive match, so a new strategy variant fails to compile
//! here until it is scored.

use rollup_core::models::{MatchScore, MatchStrategy, MatcherConfig};
use rollup_core::{GraphNode, ValidationError};

use super::arn::ArnMatcher;
use super::name::NameMatcher;
use super::resource_id::ResourceIdMatcher;
use super::tag::TagMatcher;

#[derive(Debug, Clone)]
enum Scorer {
    Arn(ArnMatcher),
    ResourceId(ResourceIdMatcher),
    Name(NameMatcher),
    Tag(TagMatcher),
}

/// An enabled matcher ready to score candidate pairs.
#[derive(Debug, Clone)]
pub struct PreparedMatcher {
    /// Position in the configuration's matcher list.
    pub index: usize,
    pub strategy: MatchStrategy,
    pub priority: u32,
    pub min_confidence: u32,
    scorer: Scorer,
}

impl PreparedMatcher {
    pub fn new(index: usize, config: &MatcherConfig) -> Result<Self, ValidationError> {
        let scorer = match config {
            MatcherConfig::Arn(c) => Scorer::Arn(ArnMatcher::new(index, c)?),
            MatcherConfig::ResourceId(c) => Scorer::ResourceId(ResourceIdMatcher::new(index, c)?),
            MatcherConfig::Name(c) => Scorer::Name(NameMatcher::new(index, c)?),
            MatcherConfig::Tag(c) => Scorer::Tag(TagMatcher::new(index, c)?),
        };
        Ok(Self {
            index,
            strategy: config.strategy(),
            priority: config.priority(),
            min_confidence: config.min_confidence(),
            scorer,
        })
    }

    /// Prepare every enabled matcher. Errors from all matchers are collected.
    pub fn prepare_all(configs: &[MatcherConfig]) -> Result<Vec<Self>, Vec<ValidationError>> {
        let mut prepared = Vec::new();
        let mut errors = Vec::new();
        for (index, config) in configs.iter().enumerate() {
            if !config.is_enabled() {
                continue;
            }
            match Self::new(index, config) {
                Ok(m) => prepared.push(m),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(prepared)
        } else {
            Err(errors)
        }
    }

    /// Raw strategy score, before the `min_confidence` floor.
    pub fn raw_score(&self, source: &GraphNode, target: &GraphNode) -> Option<MatchScore> {
        match &self.scorer {
            Scorer::Arn(m) => m.score(source, target),
            Scorer::ResourceId(m) => m.score(source, target),
            Scorer::Name(m) => m.score(source, target),
            Scorer::Tag(m) => m.score(source, target),
        }
    }

    /// Score with the floor applied: results below `min_confidence` are discarded.
    pub fn score(&self, source: &GraphNode, target: &GraphNode) -> Option<MatchScore> {
        self.raw_score(source, target)
            .filter(|s| s.confidence <= 100 && s.confidence >= self.min_confidence)
    }
}
