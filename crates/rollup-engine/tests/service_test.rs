//! Configuration management through the service.

mod common;

use rollup_core::models::*;
use rollup_core::{RollupError, RollupEventType, ValidationError};

use common::*;

#[test]
fn create_validates_and_publishes() {
    let h = harness(registered_source());
    let mut input = create_input(&["repo-a", "repo-a"]);
    input.matchers.clear();
    let err = h
        .service
        .create_configuration("tenant-1", "alice", input)
        .unwrap_err();
    let RollupError::InvalidConfiguration { errors } = err else {
        panic!("expected invalid configuration, got {err:?}");
    };
    assert!(errors.contains(&ValidationError::NoEnabledMatchers));
    assert!(errors.contains(&ValidationError::DuplicateRepository {
        repository_id: "repo-a".into()
    }));
    assert!(h.publisher.events().is_empty());

    let config = h
        .service
        .create_configuration("tenant-1", "alice", create_input(&["repo-a", "repo-b"]))
        .unwrap();
    assert_eq!(config.version, 1);
    assert_eq!(config.status, RollupStatus::Active);
    assert_eq!(
        h.publisher.events_of(RollupEventType::ConfigurationCreated).len(),
        1
    );
}

#[test]
fn stale_version_is_rejected_and_current_version_increments_by_one() {
    let h = harness(registered_source());
    let config = h
        .service
        .create_configuration("tenant-1", "alice", create_input(&["repo-a", "repo-b"]))
        .unwrap();

    let updated = h
        .service
        .update_configuration(
            &config.id,
            "bob",
            UpdateRollupInput {
                expected_version: 1,
                name: Some("platform-v2".into()),
                ..UpdateRollupInput::default()
            },
        )
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.updated_by.as_deref(), Some("bob"));

    let err = h
        .service
        .update_configuration(
            &config.id,
            "carol",
            UpdateRollupInput {
                expected_version: 1,
                name: Some("stale".into()),
                ..UpdateRollupInput::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RollupError::VersionConflict {
            expected: 1,
            current: 2,
            ..
        }
    ));
    assert_eq!(h.service.get_configuration(&config.id).unwrap().name, "platform-v2");
}

#[test]
fn invalid_update_is_never_partially_applied() {
    let h = harness(registered_source());
    let config = h
        .service
        .create_configuration("tenant-1", "alice", create_input(&["repo-a", "repo-b"]))
        .unwrap();
    let err = h
        .service
        .update_configuration(
            &config.id,
            "bob",
            UpdateRollupInput {
                expected_version: 1,
                name: Some("renamed".into()),
                repository_ids: Some(vec!["repo-a".into()]),
                ..UpdateRollupInput::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, RollupError::InvalidConfiguration { .. }));
    let stored = h.service.get_configuration(&config.id).unwrap();
    assert_eq!(stored.name, "platform");
    assert_eq!(stored.version, 1);
}

#[test]
fn status_changes_follow_the_transition_table() {
    let h = harness(registered_source());
    let config = h
        .service
        .create_configuration("tenant-1", "alice", create_input(&["repo-a", "repo-b"]))
        .unwrap();
    let err = h
        .service
        .update_configuration(
            &config.id,
            "bob",
            UpdateRollupInput {
                expected_version: 1,
                status: Some(RollupStatus::Executing),
                ..UpdateRollupInput::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, RollupError::InvalidStateTransition { .. }));

    let archived = h
        .service
        .update_configuration(
            &config.id,
            "bob",
            UpdateRollupInput {
                expected_version: 1,
                status: Some(RollupStatus::Archived),
                ..UpdateRollupInput::default()
            },
        )
        .unwrap();
    assert_eq!(archived.status, RollupStatus::Archived);
}

#[tokio::test]
async fn archived_configurations_do_not_execute() {
    let h = harness(registered_source());
    let config = h
        .service
        .create_configuration("tenant-1", "alice", create_input(&["repo-a", "repo-b"]))
        .unwrap();
    h.service
        .update_configuration(
            &config.id,
            "bob",
            UpdateRollupInput {
                expected_version: 1,
                status: Some(RollupStatus::Archived),
                ..UpdateRollupInput::default()
            },
        )
        .unwrap();
    let err = h
        .service
        .execute(&config.id, ExecuteOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RollupError::InvalidStateTransition { .. }));
    assert!(h.service.list_executions(&config.id, None).unwrap().is_empty());
}

#[test]
fn list_and_delete() {
    let h = harness(registered_source());
    let a = h
        .service
        .create_configuration("tenant-1", "alice", create_input(&["repo-a", "repo-b"]))
        .unwrap();
    h.service
        .create_configuration("tenant-2", "alice", create_input(&["repo-a", "repo-b"]))
        .unwrap();

    let listed = h
        .service
        .list_configurations(&ConfigurationFilter::for_tenant("tenant-1"))
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, a.id);

    h.service.delete_configuration(&a.id).unwrap();
    assert!(matches!(
        h.service.get_configuration(&a.id),
        Err(RollupError::ConfigurationNotFound { .. })
    ));
    assert!(matches!(
        h.service.delete_configuration(&a.id),
        Err(RollupError::ConfigurationNotFound { .. })
    ));
    assert_eq!(
        h.publisher.events_of(RollupEventType::ConfigurationDeleted).len(),
        1
    );
}

#[tokio::test]
async fn zero_timeout_is_rejected_before_execution() {
    let h = harness(registered_source());
    let config = h
        .service
        .create_configuration("tenant-1", "alice", create_input(&["repo-a", "repo-b"]))
        .unwrap();

    let err = h
        .service
        .execute(
            &config.id,
            ExecuteOverrides {
                timeout_seconds: Some(0),
                ..ExecuteOverrides::default()
            },
        )
        .await
        .unwrap_err();
    let RollupError::InvalidConfiguration { errors } = err else {
        panic!("expected invalid configuration, got {err:?}");
    };
    assert_eq!(errors, vec![ValidationError::InvalidTimeout]);
    assert!(h.service.list_executions(&config.id, None).unwrap().is_empty());
    assert_eq!(
        h.service.get_configuration(&config.id).unwrap().status,
        RollupStatus::Active
    );
}
