//! Resource-id strategy: exact comparison of an identifying attribute.

use regex::Regex;
use rollup_core::models::{MatchScore, ResourceIdMatcherConfig};
use rollup_core::{GraphNode, ValidationError};

/// Matches any resource type.
pub const ANY_RESOURCE_TYPE: &str = "*";

#[derive(Debug, Clone)]
pub struct ResourceIdMatcher {
    resource_type: String,
    id_attribute: String,
    normalize: bool,
    extraction: Option<Regex>,
}

/// A node's resource type, falling back to its node type.
pub fn effective_resource_type(node: &GraphNode) -> &str {
    node.resource_type().unwrap_or(node.node_type.as_str())
}

impl ResourceIdMatcher {
    pub fn new(index: usize, config: &ResourceIdMatcherConfig) -> Result<Self, ValidationError> {
        if config.id_attribute.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                index,
                field: "idAttribute",
            });
        }
        if config.resource_type.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                index,
                field: "resourceType",
            });
        }
        let extraction = config
            .extraction_pattern
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
            resource_type: config.resource_type.clone(),
            id_attribute: config.id_attribute.clone(),
            normalize: config.normalize,
            extraction,
        })
    }

    fn extract_id(&self, node: &GraphNode) -> Option<String> {
        let raw = node.attribute_str(&self.id_attribute)?;
        let extracted = match &self.extraction {
            Some(re) => {
                let caps = re.captures(&raw)?;
                caps.get(1).or_else(|| caps.get(0))?.as_str().to_string()
            }
            None => raw,
        };
        let id = if self.normalize {
            extracted.trim().to_lowercase()
        } else {
            extracted
        };
        (!id.is_empty()).then_some(id)
    }

    pub fn score(&self, source: &GraphNode, target: &GraphNode) -> Option<MatchScore> {
        let source_type = effective_resource_type(source);
        if source_type != effective_resource_type(target) {
            return None;
        }
        if self.resource_type != ANY_RESOURCE_TYPE && self.resource_type != source_type {
            return None;
        }
        let source_id = self.extract_id(source)?;
        let target_id = self.extract_id(target)?;
        (source_id == target_id).then(|| MatchScore {
            confidence: 100,
            matched_attribute: self.id_attribute.clone(),
            source_value: source_id,
            target_value: target_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_core::models::MatcherCommon;
    use serde_json::json;

    fn bucket(id: &str, bucket: &str) -> GraphNode {
        GraphNode::new(id, "resource", id)
            .with_metadata("resourceType", json!("aws_s3_bucket"))
            .with_metadata("attributes", json!({ "bucket": bucket }))
    }

    fn matcher(normalize: bool, extraction: Option<&str>) -> ResourceIdMatcher {
        ResourceIdMatcher::new(
            0,
            &ResourceIdMatcherConfig {
                common: MatcherCommon::default(),
                resource_type: "aws_s3_bucket".into(),
                id_attribute: "attributes.bucket".into(),
                normalize,
                extraction_pattern: extraction.map(str::to_string),
            },
        )
        .unwrap()
    }

    #[test]
    fn exact_id_matches() {
        let score = matcher(false, None)
            .score(&bucket("a", "logs"), &bucket("b", "logs"))
            .unwrap();
        assert_eq!(score.confidence, 100);
        assert_eq!(score.matched_attribute, "attributes.bucket");
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert!(matcher(false, None)
            .score(&bucket("a", " Logs"), &bucket("b", "logs"))
            .is_none());
        assert!(matcher(true, None)
            .score(&bucket("a", " Logs"), &bucket("b", "logs"))
            .is_some());
    }

    #[test]
    fn extraction_uses_first_group() {
        let m = matcher(false, Some("^prod-(.+)$"));
        let score = m
            .score(&bucket("a", "prod-logs"), &bucket("b", "prod-logs"))
            .unwrap();
        assert_eq!(score.source_value, "logs");
        assert!(m.score(&bucket("a", "dev-logs"), &bucket("b", "dev-logs")).is_none());
    }

    #[test]
    fn different_resource_types_never_match() {
        let other = GraphNode::new("b", "resource", "b")
            .with_metadata("resourceType", json!("aws_sqs_queue"))
            .with_metadata("attributes", json!({ "bucket": "logs" }));
        assert!(matcher(false, None).score(&bucket("a", "logs"), &other).is_none());
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = ResourceIdMatcher::new(
            1,
            &ResourceIdMatcherConfig {
                common: MatcherCommon::default(),
                resource_type: "*".into(),
                id_attribute: "id".into(),
                normalize: false,
                extraction_pattern: Some("(".into()),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPattern { index: 1, .. }));
    }
}
