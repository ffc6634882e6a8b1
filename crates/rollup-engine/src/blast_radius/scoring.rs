//! Impact score and risk classification.

use rollup_core::models::{RiskLevel, DECAY_FACTOR};

/// `Σ DECAY_FACTOR^depth` over the impacted nodes.
pub fn impact_score(depths: impl IntoIterator<Item = u32>) -> f64 {
    depths
        .into_iter()
        .map(|depth| DECAY_FACTOR.powi(depth as i32))
        .sum()
}

/// First matching row wins.
pub fn classify_risk(total_impacted: usize, cross_repo_count: usize) -> RiskLevel {
    if total_impacted > 100 && cross_repo_count > 3 {
        RiskLevel::Critical
    } else if total_impacted > 50 || cross_repo_count > 2 {
        RiskLevel::High
    } else if total_impacted > 10 || cross_repo_count > 0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
