//! ARN strategy: component-wise comparison of `arn:partition:service:region:account:resource`.

use glob::Pattern;
use rollup_core::models::{ArnComponent, ArnMatcherConfig, MatchScore};
use rollup_core::{GraphNode, ValidationError};

/// A parsed ARN borrowing from its source string. `resource` keeps any
/// further `:` or `/` separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedArn<'a> {
    pub partition: &'a str,
    pub service: &'a str,
    pub region: &'a str,
    pub account: &'a str,
    pub resource: &'a str,
}

impl<'a> ParsedArn<'a> {
    pub fn parse(raw: &'a str) -> Option<Self> {
        let mut parts = raw.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let arn = Self {
            partition: parts.next()?,
            service: parts.next()?,
            region: parts.next()?,
            account: parts.next()?,
            resource: parts.next()?,
        };
        (!arn.partition.is_empty() && !arn.service.is_empty() && !arn.resource.is_empty())
            .then_some(arn)
    }

    pub fn component(&self, component: ArnComponent) -> &'a str {
        match component {
            ArnComponent::Partition => self.partition,
            ArnComponent::Service => self.service,
            ArnComponent::Region => self.region,
            ArnComponent::Account => self.account,
            ArnComponent::Resource => self.resource,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArnMatcher {
    allow_partial: bool,
    pattern: Option<Pattern>,
    components: Vec<ArnComponent>,
}

impl ArnMatcher {
    pub fn new(index: usize, config: &ArnMatcherConfig) -> Result<Self, ValidationError> {
        let components = config.components.selected();
        if components.is_empty() {
            return Err(ValidationError::NoArnComponents { index });
        }
        let pattern = config
            .pattern
            .as_deref()
            .map(|p| {
                Pattern::new(p).map_err(|e| ValidationError::InvalidPattern {
                    index,
                    pattern: p.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self {
            allow_partial: config.allow_partial,
            pattern,
            components,
        })
    }

    fn eligible<'n>(&self, node: &'n GraphNode) -> Option<&'n str> {
        let arn = node.arn()?;
        match &self.pattern {
            Some(pattern) if !pattern.matches(arn) => None,
            _ => Some(arn),
        }
    }

    pub fn score(&self, source: &GraphNode, target: &GraphNode) -> Option<MatchScore> {
        let source_arn = self.eligible(source)?;
        let target_arn = self.eligible(target)?;
        let a = ParsedArn::parse(source_arn)?;
        let b = ParsedArn::parse(target_arn)?;

        let compared = self.components.len() as u32;
        let equal = self
            .components
            .iter()
            .filter(|c| a.component(**c) == b.component(**c))
            .count() as u32;

        let confidence = if equal == compared {
            100
        } else if self.allow_partial && equal > 0 {
            equal * 100 / compared
        } else {
            return None;
        };

        Some(MatchScore {
            confidence,
            matched_attribute: "arn".to_string(),
            source_value: source_arn.to_string(),
            target_value: target_arn.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_core::models::{ArnComponents, MatcherCommon};
    use serde_json::json;

    fn node(id: &str, arn: &str) -> GraphNode {
        GraphNode::new(id, "resource", id).with_metadata("arn", json!(arn))
    }

    fn config(components: ArnComponents, allow_partial: bool) -> ArnMatcherConfig {
        ArnMatcherConfig {
            common: MatcherCommon::default(),
            pattern: None,
            allow_partial,
            components,
        }
    }

    #[test]
    fn parses_resource_with_separators() {
        let arn = ParsedArn::parse("arn:aws:lambda:us-east-1:123456789012:function:my-fn").unwrap();
        assert_eq!(arn.service, "lambda");
        assert_eq!(arn.resource, "function:my-fn");
        assert!(ParsedArn::parse("not-an-arn").is_none());
        assert!(ParsedArn::parse("arn:aws:s3").is_none());
    }

    #[test]
    fn exact_service_and_resource() {
        let matcher = ArnMatcher::new(
            0,
            &config(
                ArnComponents {
                    service: true,
                    resource: true,
                    ..ArnComponents::default()
                },
                false,
            ),
        )
        .unwrap();
        let score = matcher
            .score(&node("a", "arn:aws:s3:::bucket1"), &node("b", "arn:aws:s3:::bucket1"))
            .unwrap();
        assert_eq!(score.confidence, 100);
        assert_eq!(score.matched_attribute, "arn");
    }

    #[test]
    fn partial_scores_floor() {
        let matcher = ArnMatcher::new(0, &config(ArnComponents::all(), true)).unwrap();
        // partition, service, resource equal; region and account differ: 3/5.
        let score = matcher
            .score(
                &node("a", "arn:aws:sqs:us-east-1:111111111111:queue"),
                &node("b", "arn:aws:sqs:eu-west-1:222222222222:queue"),
            )
            .unwrap();
        assert_eq!(score.confidence, 60);

        let strict = ArnMatcher::new(0, &config(ArnComponents::all(), false)).unwrap();
        assert!(strict
            .score(
                &node("a", "arn:aws:sqs:us-east-1:111111111111:queue"),
                &node("b", "arn:aws:sqs:eu-west-1:222222222222:queue"),
            )
            .is_none());
    }

    #[test]
    fn partial_with_two_of_three() {
        let matcher = ArnMatcher::new(
            0,
            &config(
                ArnComponents {
                    service: true,
                    region: true,
                    resource: true,
                    ..ArnComponents::default()
                },
                true,
            ),
        )
        .unwrap();
        let score = matcher
            .score(
                &node("a", "arn:aws:sqs:us-east-1:1:queue"),
                &node("b", "arn:aws:sqs:eu-west-1:1:queue"),
            )
            .unwrap();
        assert_eq!(score.confidence, 66);
    }

    #[test]
    fn pattern_filters_both_sides() {
        let mut cfg = config(ArnComponents::all(), false);
        cfg.pattern = Some("arn:aws:s3:::*".into());
        let matcher = ArnMatcher::new(0, &cfg).unwrap();
        assert!(matcher
            .score(
                &node("a", "arn:aws:sqs:us-east-1:1:q"),
                &node("b", "arn:aws:sqs:us-east-1:1:q"),
            )
            .is_none());
        assert!(matcher
            .score(&node("a", "arn:aws:s3:::b"), &node("b", "arn:aws:s3:::b"))
            .is_some());
    }

    #[test]
    fn id_is_used_when_no_arn_attribute() {
        let matcher = ArnMatcher::new(0, &config(ArnComponents::all(), false)).unwrap();
        let a = GraphNode::new("arn:aws:s3:::logs", "resource", "logs");
        let b = node("b", "arn:aws:s3:::logs");
        assert_eq!(matcher.score(&a, &b).unwrap().confidence, 100);
    }

    #[test]
    fn no_components_is_rejected() {
        let err = ArnMatcher::new(3, &config(ArnComponents::default(), false)).unwrap_err();
        assert_eq!(err, ValidationError::NoArnComponents { index: 3 });
    }
}
