//! Name strategy: exact or fuzzy (normalized Levenshtein) name comparison.

use regex::Regex;
use rollup_core::models::{MatchScore, NameMatcherConfig};
use rollup_core::{GraphNode, ValidationError};

#[derive(Debug, Clone)]
pub struct NameMatcher {
    pattern: Option<Regex>,
    include_namespace: bool,
    case_sensitive: bool,
    fuzzy_threshold: Option<u32>,
}

/// Similarity of two strings on a 0–100 scale, floored.
pub fn similarity(a: &str, b: &str) -> u32 {
    let ratio = strsim::normalized_levenshtein(a, b);
    // epsilon keeps exact ratios such as 0.29 from flooring one point low
    ((ratio * 100.0 + 1e-9).floor() as u32).min(100)
}

impl NameMatcher {
    pub fn new(index: usize, config: &NameMatcherConfig) -> Result<Self, ValidationError> {
        let pattern = config
            .pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| ValidationError::InvalidPattern {
                    index,
                    pattern: p.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self {
            pattern,
            include_namespace: config.include_namespace,
            case_sensitive: config.case_sensitive,
            fuzzy_threshold: config.fuzzy_threshold,
        })
    }

    fn comparable(&self, node: &GraphNode) -> Option<String> {
        if node.name.is_empty() {
            return None;
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&node.name) {
                return None;
            }
        }
        let key = if self.include_namespace {
            format!("{}/{}", node.namespace().unwrap_or_default(), node.name)
        } else {
            node.name.clone()
        };
        Some(if self.case_sensitive {
            key
        } else {
            key.to_lowercase()
        })
    }

    pub fn score(&self, source: &GraphNode, target: &GraphNode) -> Option<MatchScore> {
        let a = self.comparable(source)?;
        let b = self.comparable(target)?;
        let confidence = match self.fuzzy_threshold {
            Some(threshold) => {
                let score = if a == b { 100 } else { similarity(&a, &b) };
                if score < threshold {
                    return None;
                }
                score
            }
            None if a == b => 100,
            None => return None,
        };
        Some(MatchScore {
            confidence,
            matched_attribute: if self.include_namespace {
                "namespace/name".to_string()
            } else {
                "name".to_string()
            },
            source_value: a,
            target_value: b,
        })
    }
}
