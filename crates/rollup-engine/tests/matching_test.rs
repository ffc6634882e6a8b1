//! Matching scenarios and properties over the coordinator.

mod common;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rollup_core::config::MatchingConfig;
use rollup_core::models::*;
use rollup_core::ScopedNode;
use rollup_engine::{MatchingCoordinator, MergeEngine, PhaseControl, PreparedMatcher};
use serde_json::json;

use common::*;

fn run(configs: &[MatcherConfig], nodes: &[ScopedNode], parallel: bool) -> Vec<MatchResult> {
    let matchers = PreparedMatcher::prepare_all(configs).unwrap();
    let config = MatchingConfig {
        parallel,
        ..MatchingConfig::default()
    };
    MatchingCoordinator::new(&matchers, config)
        .run(nodes, PhaseControl::detached())
        .unwrap()
        .matches
}

#[test]
fn arn_service_and_resource_match_exactly() {
    let nodes = vec![
        scoped("repo-1", with_arn(resource("a", "bucket1"), "arn:aws:s3:::bucket1")),
        scoped("repo-2", with_arn(resource("b", "bucket-one"), "arn:aws:s3:::bucket1")),
    ];
    let matches = run(&[arn_matcher()], &nodes, false);
    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.confidence, 100);
    assert_eq!(m.matched_attribute, "arn");
    assert_eq!(m.strategy, MatchStrategy::Arn);
    assert_eq!(m.source_repository_id, "repo-1");
    assert_eq!(m.target_repository_id, "repo-2");
}

#[test]
fn tag_all_mode_ignores_extra_tags() {
    let tag = MatcherConfig::Tag(TagMatcherConfig {
        common: MatcherCommon::default(),
        required_tags: vec![
            RequiredTag::with_value("env", "prod"),
            RequiredTag::key_only("team"),
        ],
        match_mode: TagMatchMode::All,
        ignore_tags: vec![],
    });
    let nodes = vec![
        scoped(
            "repo-1",
            resource("a", "x").with_metadata("tags", json!({"env": "prod", "team": "infra"})),
        ),
        scoped(
            "repo-2",
            resource("b", "y")
                .with_metadata("tags", json!({"env": "prod", "team": "infra", "extra": "x"})),
        ),
    ];
    let matches = run(&[tag], &nodes, false);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].confidence, 100);
    assert_eq!(matches[0].strategy, MatchStrategy::Tag);
}

#[test]
fn same_repository_pairs_are_never_compared() {
    let nodes = vec![
        scoped("repo-1", resource("a", "orders")),
        scoped("repo-1", resource("b", "orders")),
    ];
    assert!(run(&[name_matcher()], &nodes, false).is_empty());
}

#[test]
fn higher_priority_wins_on_equal_confidence() {
    let nodes = vec![
        scoped("repo-1", with_arn(resource("a", "orders"), "arn:aws:s3:::orders")),
        scoped("repo-2", with_arn(resource("b", "orders"), "arn:aws:s3:::orders")),
    ];
    let matches = run(&[name_matcher(), arn_matcher()], &nodes, false);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].strategy, MatchStrategy::Arn);
}

#[test]
fn chained_matches_merge_transitively() {
    // A~B by name, B~C by ARN; A and C share nothing.
    let nodes = vec![
        scoped("repo-1", resource("a", "orders")),
        scoped("repo-2", with_arn(resource("b", "orders"), "arn:aws:s3:::orders-data")),
        scoped("repo-3", with_arn(resource("c", "bucket-x"), "arn:aws:s3:::orders-data")),
    ];
    let matches = run(&[name_matcher(), arn_matcher()], &nodes, false);
    assert_eq!(matches.len(), 2);
    assert!(!matches
        .iter()
        .any(|m| m.source_node_id == "a" && m.target_node_id == "c"));

    let options = MergeOptions::default();
    let outcome = MergeEngine::new(&options)
        .run(&nodes, &[], &matches, Utc::now(), PhaseControl::detached())
        .unwrap();
    assert_eq!(outcome.graph.merged_nodes.len(), 1);
    let merged = &outcome.graph.merged_nodes[0];
    assert_eq!(merged.source_node_ids(), vec!["a", "b", "c"]);
    assert_eq!(merged.repository_ids, vec!["repo-1", "repo-2", "repo-3"]);
    assert_eq!(merged.match_info.source_count, 3);
}

fn node_set() -> impl Strategy<Value = Vec<ScopedNode>> {
    prop::collection::vec((0usize..3, "[ab]{1,4}"), 1..12).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (repo, name))| {
                scoped(&format!("repo-{repo}"), resource(&format!("n{i}"), &name))
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn accepted_confidence_respects_floor(
        nodes in node_set(),
        floor in 0u32..=100,
        threshold in 0u32..=100,
    ) {
        let matcher = MatcherConfig::Name(NameMatcherConfig {
            common: MatcherCommon { enabled: true, priority: 50, min_confidence: floor },
            pattern: None,
            include_namespace: false,
            case_sensitive: false,
            fuzzy_threshold: Some(threshold),
        });
        for m in run(&[matcher], &nodes, true) {
            prop_assert!(m.confidence <= 100);
            prop_assert!(m.confidence >= floor);
            prop_assert!(m.source_key() < m.target_key());
            prop_assert_ne!(&m.source_repository_id, &m.target_repository_id);
        }
    }

    #[test]
    fn parallel_and_sequential_agree(nodes in node_set()) {
        let configs = [name_matcher()];
        prop_assert_eq!(run(&configs, &nodes, true), run(&configs, &nodes, false));
    }

    #[test]
    fn merge_is_deterministic(nodes in node_set()) {
        let matches = run(&[name_matcher()], &nodes, true);
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let options = MergeOptions {
            conflict_resolution: ConflictResolution::Merge,
            ..MergeOptions::default()
        };
        let first = MergeEngine::new(&options)
            .run(&nodes, &[], &matches, at, PhaseControl::detached())
            .unwrap();
        let second = MergeEngine::new(&options)
            .sequential()
            .run(&nodes, &[], &matches, at, PhaseControl::detached())
            .unwrap();
        prop_assert_eq!(first.graph, second.graph);
        prop_assert_eq!(first.matched_nodes + first.unmatched_nodes, nodes.len());
    }
}
