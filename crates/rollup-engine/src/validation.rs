//! Configuration validation.
//!
//! Every rule is checked and every failure collected, so a rejected
//! configuration reports all of its problems at once. Nothing is applied
//! until the whole configuration validates.

use std::collections::BTreeSet;

use rollup_core::models::{ExecuteOverrides, MatcherConfig, RollupConfiguration, RollupSchedule};
use rollup_core::{RollupError, RollupResult, ValidationError};

use crate::matching::PreparedMatcher;

const MIN_REPOSITORIES: usize = 2;

fn check_percent(errors: &mut Vec<ValidationError>, index: usize, field: &'static str, value: u32) {
    if value > 100 {
        errors.push(ValidationError::OutOfRange {
            index,
            field,
            value,
        });
    }
}

fn validate_repositories(config: &RollupConfiguration, errors: &mut Vec<ValidationError>) {
    if config.repository_ids.len() < MIN_REPOSITORIES {
        errors.push(ValidationError::InsufficientRepositories {
            count: config.repository_ids.len(),
        });
    }
    let mut seen = BTreeSet::new();
    let mut reported = BTreeSet::new();
    for repository_id in &config.repository_ids {
        if !seen.insert(repository_id.as_str()) && reported.insert(repository_id.as_str()) {
            errors.push(ValidationError::DuplicateRepository {
                repository_id: repository_id.clone(),
            });
        }
    }
    for repository_id in config.scan_ids.keys() {
        if !seen.contains(repository_id.as_str()) {
            errors.push(ValidationError::UnknownScanRepository {
                repository_id: repository_id.clone(),
            });
        }
    }
}

fn validate_matchers(matchers: &[MatcherConfig], errors: &mut Vec<ValidationError>) {
    if !matchers.iter().any(MatcherConfig::is_enabled) {
        errors.push(ValidationError::NoEnabledMatchers);
    }
    for (index, matcher) in matchers.iter().enumerate() {
        let common = matcher.common();
        check_percent(errors, index, "priority", common.priority);
        check_percent(errors, index, "minConfidence", common.min_confidence);
        if let MatcherConfig::Name(name) = matcher {
            if let Some(threshold) = name.fuzzy_threshold {
                check_percent(errors, index, "fuzzyThreshold", threshold);
            }
        }
        // Disabled matchers are still checked: enabling one must not be
        // able to turn a valid configuration invalid.
        if let Err(e) = PreparedMatcher::new(index, matcher) {
            errors.push(e);
        }
    }
}

fn validate_schedule(schedule: &RollupSchedule, errors: &mut Vec<ValidationError>) {
    if let Some(cron) = &schedule.cron {
        let fields = cron.split_whitespace().count();
        if !(5..=6).contains(&fields) {
            errors.push(ValidationError::InvalidCron {
                expression: cron.clone(),
            });
        }
    }
}

/// All validation failures of `config`, in rule order.
pub fn validation_errors(config: &RollupConfiguration) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if config.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }
    validate_repositories(config, &mut errors);
    validate_matchers(&config.matchers, &mut errors);

    let overlap = config.node_type_filter.overlap();
    if !overlap.is_empty() {
        errors.push(ValidationError::ConflictingNodeTypeFilter { types: overlap });
    }
    if config.merge_options.max_nodes == Some(0) {
        errors.push(ValidationError::InvalidMaxNodes);
    }
    if let Some(schedule) = &config.schedule {
        validate_schedule(schedule, &mut errors);
    }
    errors
}

/// `Err(InvalidConfiguration)` carrying every failure, or `Ok`.
pub fn validate_configuration(config: &RollupConfiguration) -> RollupResult<()> {
    let errors = validation_errors(config);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RollupError::InvalidConfiguration { errors })
    }
}

/// Per-request checks on `execute` overrides. A zero timeout would fail
/// every attempt before it loads anything.
pub fn validate_overrides(overrides: &ExecuteOverrides) -> RollupResult<()> {
    if overrides.timeout_seconds == Some(0) {
        return Err(RollupError::InvalidConfiguration {
            errors: vec![ValidationError::InvalidTimeout],
        });
    }
    Ok(())
}
