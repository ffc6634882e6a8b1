//! Configuration validation failures. Collected, never short-circuited, so a
//! caller sees every problem with a submitted configuration at once.

use super::error_code::{self, RollupErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("at least 2 repositories are required, got {count}")]
    InsufficientRepositories { count: usize },

    #[error("repository {repository_id} is listed more than once")]
    DuplicateRepository { repository_id: String },

    #[error("scan id given for repository {repository_id}, which is not part of the rollup")]
    UnknownScanRepository { repository_id: String },

    #[error("at least one enabled matcher is required")]
    NoEnabledMatchers,

    #[error("node types {types:?} are both included and excluded")]
    ConflictingNodeTypeFilter { types: Vec<String> },

    #[error("matcher {index}: {field} must be within 0..=100, got {value}")]
    OutOfRange {
        index: usize,
        field: &'static str,
        value: u32,
    },

    #[error("matcher {index}: tag matcher needs at least one required tag")]
    NoRequiredTags { index: usize },

    #[error("matcher {index}: arn matcher must compare at least one component")]
    NoArnComponents { index: usize },

    #[error("matcher {index}: {field} must not be empty")]
    EmptyField { index: usize, field: &'static str },

    #[error("matcher {index}: invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        reason: String,
    },

    #[error("invalid cron expression {expression:?}: expected 5 or 6 fields")]
    InvalidCron { expression: String },

    #[error("maxNodes must be at least 1")]
    InvalidMaxNodes,

    #[error("timeoutSeconds must be at least 1")]
    InvalidTimeout,
}

impl RollupErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        error_code::INVALID_CONFIGURATION
    }
}
