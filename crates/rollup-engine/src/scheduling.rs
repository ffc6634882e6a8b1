//! Trigger checks for scheduled rollups.

use rollup_core::models::{RollupConfiguration, RollupStatus};

/// Statuses a scan-complete trigger may start from. `completed` and `failed`
/// are an active configuration after its last run.
fn is_triggerable(status: RollupStatus) -> bool {
    matches!(
        status,
        RollupStatus::Active | RollupStatus::Completed | RollupStatus::Failed
    )
}

/// Whether a finished scan of `repository_id` should start `config`.
pub fn should_trigger_on_scan(config: &RollupConfiguration, repository_id: &str) -> bool {
    is_triggerable(config.status)
        && config
            .schedule
            .as_ref()
            .is_some_and(|schedule| schedule.on_scan_complete)
        && config.repository_ids.iter().any(|r| r == repository_id)
}
