//! Tag strategy: required tags checked on both nodes.

use regex::Regex;
use rollup_core::models::{MatchScore, RequiredTag, TagMatchMode, TagMatcherConfig};
use rollup_core::types::graph::value_as_string;
use rollup_core::{GraphNode, ValidationError};

#[derive(Debug, Clone)]
struct PreparedTag {
    key: String,
    value: Option<String>,
    value_pattern: Option<Regex>,
}

impl PreparedTag {
    fn value_on(&self, node: &GraphNode) -> Option<String> {
        let value = node.tags()?.get(&self.key).and_then(value_as_string)?;
        if let Some(expected) = &self.value {
            if &value != expected {
                return None;
            }
        }
        if let Some(pattern) = &self.value_pattern {
            if !pattern.is_match(&value) {
                return None;
            }
        }
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct TagMatcher {
    required: Vec<PreparedTag>,
    mode: TagMatchMode,
}

impl TagMatcher {
    pub fn new(index: usize, config: &TagMatcherConfig) -> Result<Self, ValidationError> {
        let required = config
            .required_tags
            .iter()
            .filter(|t| !config.ignore_tags.contains(&t.key))
            .map(|t| prepare(index, t))
            .collect::<Result<Vec<_>, _>>()?;
        if required.is_empty() {
            return Err(ValidationError::NoRequiredTags { index });
        }
        Ok(Self {
            required,
            mode: config.match_mode,
        })
    }

    pub fn score(&self, source: &GraphNode, target: &GraphNode) -> Option<MatchScore> {
        let mut source_values = Vec::new();
        let mut target_values = Vec::new();
        for tag in &self.required {
            // A key-only requirement is satisfied by presence; values may differ.
            let (Some(a), Some(b)) = (tag.value_on(source), tag.value_on(target)) else {
                continue;
            };
            source_values.push(format!("{}={a}", tag.key));
            target_values.push(format!("{}={b}", tag.key));
        }

        let matched = source_values.len();
        let total = self.required.len();
        let accepted = match self.mode {
            TagMatchMode::All => matched == total,
            TagMatchMode::Any => matched > 0,
        };
        if !accepted {
            return None;
        }
        Some(MatchScore {
            confidence: (matched * 100 / total) as u32,
            matched_attribute: "tags".to_string(),
            source_value: source_values.join(","),
            target_value: target_values.join(","),
        })
    }
}

fn prepare(index: usize, tag: &RequiredTag) -> Result<PreparedTag, ValidationError> {
    let value_pattern = tag
        .value_pattern
        .as_deref()
        .map(|p| {
            Regex::new(p).map_err(|e| ValidationError::InvalidPattern {
                index,
                pattern: p.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()?;
    Ok(PreparedTag {
        key: tag.key.clone(),
        value: tag.value.clone(),
        value_pattern,
    })
}
