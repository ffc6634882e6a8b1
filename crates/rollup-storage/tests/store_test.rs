//! Contract tests run against both store implementations.

use std::collections::BTreeMap;

use chrono::Utc;
use rollup_core::models::*;
use rollup_core::{RollupStore, StorageError};
use rollup_storage::{InMemoryRollupStore, SqliteRollupStore};

fn config(id: &str, tenant: &str, status: RollupStatus) -> RollupConfiguration {
    let now = Utc::now();
    RollupConfiguration {
        id: id.into(),
        tenant_id: tenant.into(),
        name: format!("{id}-name"),
        description: None,
        status,
        repository_ids: vec!["repo-a".into(), "repo-b".into()],
        scan_ids: BTreeMap::new(),
        matchers: vec![MatcherConfig::Name(NameMatcherConfig {
            common: MatcherCommon::default(),
            pattern: None,
            include_namespace: false,
            case_sensitive: false,
            fuzzy_threshold: None,
        })],
        node_type_filter: NodeTypeFilter::default(),
        merge_options: MergeOptions::default(),
        schedule: None,
        version: 1,
        created_by: "alice".into(),
        created_at: now,
        updated_by: None,
        updated_at: now,
    }
}

fn stores() -> Vec<(&'static str, Box<dyn RollupStore>)> {
    vec![
        ("memory", Box::new(InMemoryRollupStore::new())),
        ("sqlite", Box::new(SqliteRollupStore::open_in_memory().unwrap())),
    ]
}

#[test]
fn configuration_crud_and_optimistic_locking() {
    for (name, store) in stores() {
        let c = config("r1", "t1", RollupStatus::Draft);
        store.insert_configuration(&c).unwrap();
        assert!(
            matches!(
                store.insert_configuration(&c),
                Err(StorageError::AlreadyExists { .. })
            ),
            "{name}"
        );

        let mut next = c.clone();
        next.name = "renamed".into();
        let stored = store.update_configuration(&next, 1).unwrap();
        assert_eq!(stored.version, 2, "{name}");
        assert_eq!(store.get_configuration("r1").unwrap().unwrap(), stored, "{name}");

        match store.update_configuration(&next, 1) {
            Err(StorageError::VersionConflict {
                expected, current, ..
            }) => {
                assert_eq!((expected, current), (1, 2), "{name}");
            }
            other => panic!("{name}: expected version conflict, got {other:?}"),
        }

        assert!(matches!(
            store.update_configuration(&config("missing", "t1", RollupStatus::Draft), 1),
            Err(StorageError::NotFound { .. })
        ));
    }
}

#[test]
fn list_filters_orders_and_pages() {
    for (name, store) in stores() {
        store.insert_configuration(&config("a", "t1", RollupStatus::Active)).unwrap();
        store.insert_configuration(&config("b", "t2", RollupStatus::Active)).unwrap();
        store.insert_configuration(&config("c", "t1", RollupStatus::Draft)).unwrap();
        store.insert_configuration(&config("d", "t1", RollupStatus::Active)).unwrap();

        let ids = |filter: ConfigurationFilter| -> Vec<String> {
            store
                .list_configurations(&filter)
                .unwrap()
                .into_iter()
                .map(|c| c.id)
                .collect()
        };

        assert_eq!(ids(ConfigurationFilter::default()), vec!["a", "b", "c", "d"], "{name}");
        assert_eq!(
            ids(ConfigurationFilter {
                tenant_id: Some("t1".into()),
                status: Some(RollupStatus::Active),
                ..ConfigurationFilter::default()
            }),
            vec!["a", "d"],
            "{name}"
        );
        assert_eq!(
            ids(ConfigurationFilter {
                limit: Some(2),
                offset: 1,
                ..ConfigurationFilter::default()
            }),
            vec!["b", "c"],
            "{name}"
        );
    }
}

#[test]
fn terminal_executions_are_immutable_but_linkable() {
    for (name, store) in stores() {
        store.insert_configuration(&config("r1", "t1", RollupStatus::Active)).unwrap();

        let mut first = RollupExecution::pending("e1", "r1", "t1", 1);
        store.insert_execution(&first).unwrap();
        first.status = ExecutionStatus::Failed;
        store.update_execution(&first).unwrap();

        first.progress_percent = 50;
        assert!(
            matches!(
                store.update_execution(&first),
                Err(StorageError::Immutable { .. })
            ),
            "{name}"
        );

        let mut second = RollupExecution::pending("e2", "r1", "t1", 2);
        second.retry_of = Some("e1".into());
        store.insert_execution(&second).unwrap();
        store.link_retry("e1", "e2").unwrap();

        let stored = store.get_execution("e1").unwrap().unwrap();
        assert_eq!(stored.retried_by.as_deref(), Some("e2"), "{name}");
        assert_eq!(stored.progress_percent, 0, "{name}");

        let listed: Vec<String> = store
            .list_executions("r1", None)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, vec!["e2", "e1"], "{name}");
        assert_eq!(store.list_executions("r1", Some(1)).unwrap().len(), 1, "{name}");
    }
}

#[test]
fn executions_require_their_configuration() {
    for (name, store) in stores() {
        let orphan = RollupExecution::pending("e1", "nope", "t1", 1);
        assert!(
            matches!(
                store.insert_execution(&orphan),
                Err(StorageError::NotFound { .. })
            ),
            "{name}"
        );
    }
}

#[test]
fn artifacts_round_trip_and_cascade_on_delete() {
    for (name, store) in stores() {
        store.insert_configuration(&config("r1", "t1", RollupStatus::Active)).unwrap();
        store
            .insert_execution(&RollupExecution::pending("e1", "r1", "t1", 1))
            .unwrap();

        let graph = MergedGraph::default();
        store.save_merged_graph("e1", &graph).unwrap();
        let matches = vec![MatchResult {
            source_node_id: "n1".into(),
            source_repository_id: "repo-a".into(),
            target_node_id: "n2".into(),
            target_repository_id: "repo-b".into(),
            strategy: MatchStrategy::Name,
            confidence: 90,
            matched_attribute: "name".into(),
            source_value: "orders".into(),
            target_value: "orders".into(),
        }];
        store.save_match_results("e1", &matches).unwrap();

        assert_eq!(store.load_merged_graph("e1").unwrap(), Some(graph), "{name}");
        assert_eq!(store.load_match_results("e1").unwrap(), matches, "{name}");
        assert!(store.load_match_results("e9").unwrap().is_empty(), "{name}");
        assert!(matches!(
            store.save_merged_graph("e9", &MergedGraph::default()),
            Err(StorageError::NotFound { .. })
        ));

        assert!(store.delete_configuration("r1").unwrap(), "{name}");
        assert!(!store.delete_configuration("r1").unwrap(), "{name}");
        assert!(store.get_execution("e1").unwrap().is_none(), "{name}");
        assert!(store.load_merged_graph("e1").unwrap().is_none(), "{name}");
        assert!(store.load_match_results("e1").unwrap().is_empty(), "{name}");
    }
}

#[test]
fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollup.db");
    {
        let store = SqliteRollupStore::open(&path).unwrap();
        store.insert_configuration(&config("r1", "t1", RollupStatus::Active)).unwrap();
    }
    let store = SqliteRollupStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), rollup_storage::migrations::LATEST_VERSION);
    let loaded = store.get_configuration("r1").unwrap().unwrap();
    assert_eq!(loaded.status, RollupStatus::Active);
}
