//! Matcher configuration: a closed set of strategy variants tagged by `type`.
//!
//! Adding a variant here is a breaking change on purpose: every `match` over
//! `MatcherConfig` and `MatchStrategy` in the workspace is exhaustive, so a new
//! strategy fails to compile until scoring, validation and tie-breaking handle it.

use serde::{Deserialize, Serialize};

use super::matching::MatchStrategy;

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    50
}

/// Fields shared by every matcher variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherCommon {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 0–100, higher wins a confidence tie.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// 0–100 hard floor; results below it are discarded.
    #[serde(default)]
    pub min_confidence: u32,
}

impl Default for MatcherCommon {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: default_priority(),
            min_confidence: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherConfig {
    Arn(ArnMatcherConfig),
    ResourceId(ResourceIdMatcherConfig),
    Name(NameMatcherConfig),
    Tag(TagMatcherConfig),
}

impl MatcherConfig {
    pub fn strategy(&self) -> MatchStrategy {
        match self {
            Self::Arn(_) => MatchStrategy::Arn,
            Self::ResourceId(_) => MatchStrategy::ResourceId,
            Self::Name(_) => MatchStrategy::Name,
            Self::Tag(_) => MatchStrategy::Tag,
        }
    }

    pub fn common(&self) -> &MatcherCommon {
        match self {
            Self::Arn(c) => &c.common,
            Self::ResourceId(c) => &c.common,
            Self::Name(c) => &c.common,
            Self::Tag(c) => &c.common,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.common().enabled
    }

    pub fn priority(&self) -> u32 {
        self.common().priority
    }

    pub fn min_confidence(&self) -> u32 {
        self.common().min_confidence
    }
}

/// ARN components that can be selected for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArnComponent {
    Partition,
    Service,
    Region,
    Account,
    Resource,
}

impl ArnComponent {
    pub const ALL: [ArnComponent; 5] = [
        Self::Partition,
        Self::Service,
        Self::Region,
        Self::Account,
        Self::Resource,
    ];
}

/// Which ARN components to compare. Absent flags are not compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArnComponents {
    pub partition: bool,
    pub service: bool,
    pub region: bool,
    pub account: bool,
    pub resource: bool,
}

impl ArnComponents {
    pub fn all() -> Self {
        Self {
            partition: true,
            service: true,
            region: true,
            account: true,
            resource: true,
        }
    }

    pub fn is_selected(&self, component: ArnComponent) -> bool {
        match component {
            ArnComponent::Partition => self.partition,
            ArnComponent::Service => self.service,
            ArnComponent::Region => self.region,
            ArnComponent::Account => self.account,
            ArnComponent::Resource => self.resource,
        }
    }

    /// Selected components in canonical ARN order.
    pub fn selected(&self) -> Vec<ArnComponent> {
        ArnComponent::ALL
            .iter()
            .copied()
            .filter(|c| self.is_selected(*c))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArnMatcherConfig {
    #[serde(flatten)]
    pub common: MatcherCommon,
    /// Wildcard pattern both ARNs must satisfy (`arn:aws:s3:::*`). `None` accepts any ARN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allow_partial: bool,
    #[serde(default = "ArnComponents::all")]
    pub components: ArnComponents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdMatcherConfig {
    #[serde(flatten)]
    pub common: MatcherCommon,
    /// Resource type both nodes must have; `*` accepts any shared type.
    pub resource_type: String,
    /// Dotted metadata path of the identifying attribute.
    pub id_attribute: String,
    #[serde(default)]
    pub normalize: bool,
    /// Optional regex; the first capture group (or whole match) becomes the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameMatcherConfig {
    #[serde(flatten)]
    pub common: MatcherCommon,
    /// Regex both names must satisfy to be eligible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub include_namespace: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    /// 0–100 normalized edit-distance similarity threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzzy_threshold: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredTag {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_pattern: Option<String>,
}

impl RequiredTag {
    pub fn key_only(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            value_pattern: None,
        }
    }

    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            value_pattern: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMatcherConfig {
    #[serde(flatten)]
    pub common: MatcherCommon,
    pub required_tags: Vec<RequiredTag>,
    #[serde(default)]
    pub match_mode: TagMatchMode,
    #[serde(default)]
    pub ignore_tags: Vec<String>,
}
