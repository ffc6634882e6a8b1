//! Merge engine: conflict policies, passthrough, edge remapping and limits.

mod common;

use chrono::Utc;
use rollup_core::models::*;
use rollup_core::{GraphEdge, RollupError, ScopedEdge, ScopedNode};
use rollup_engine::{MergeEngine, MergeOutcome, PhaseControl};
use serde_json::json;

use common::*;

fn name_match(a: (&str, &str), b: (&str, &str)) -> MatchResult {
    MatchResult {
        source_node_id: a.1.into(),
        source_repository_id: a.0.into(),
        target_node_id: b.1.into(),
        target_repository_id: b.0.into(),
        strategy: MatchStrategy::Name,
        confidence: 100,
        matched_attribute: "name".into(),
        source_value: "orders".into(),
        target_value: "orders".into(),
    }
}

fn fixture() -> (Vec<ScopedNode>, Vec<ScopedEdge>, Vec<MatchResult>) {
    let nodes = vec![
        scoped(
            "repo-a",
            resource("bucket", "orders")
                .with_metadata("region", json!("us-east-1"))
                .with_metadata("tags", json!({"env": "prod"})),
        ),
        scoped("repo-a", resource("fn", "ingest")),
        scoped(
            "repo-b",
            resource("s3", "orders")
                .with_metadata("region", json!("eu-west-1"))
                .with_metadata("tags", json!({"team": "data"})),
        ),
        scoped("repo-b", resource("report", "report")),
    ];
    let edges = vec![
        ScopedEdge::new("repo-a", GraphEdge::new("e1", "fn", "bucket", "writes")),
        ScopedEdge::new("repo-b", GraphEdge::new("e1", "report", "s3", "reads")),
    ];
    let matches = vec![name_match(("repo-a", "bucket"), ("repo-b", "s3"))];
    (nodes, edges, matches)
}

fn merge(options: &MergeOptions) -> Result<MergeOutcome, RollupError> {
    let (nodes, edges, matches) = fixture();
    MergeEngine::new(options).run(&nodes, &edges, &matches, Utc::now(), PhaseControl::detached())
}

fn policy(conflict_resolution: ConflictResolution) -> MergeOptions {
    MergeOptions {
        conflict_resolution,
        ..MergeOptions::default()
    }
}

#[test]
fn first_and_last_pick_by_source_order() {
    let first = merge(&policy(ConflictResolution::First)).unwrap();
    assert_eq!(first.graph.merged_nodes[0].metadata["region"], "us-east-1");

    let last = merge(&policy(ConflictResolution::Last)).unwrap();
    assert_eq!(last.graph.merged_nodes[0].metadata["region"], "eu-west-1");
}

#[test]
fn merge_policy_unions_nested_objects() {
    let outcome = merge(&policy(ConflictResolution::Merge)).unwrap();
    let merged = &outcome.graph.merged_nodes[0];
    assert_eq!(merged.metadata["tags"], json!({"env": "prod", "team": "data"}));
    assert_eq!(merged.metadata["region"], "us-east-1");
}

#[test]
fn error_policy_reports_conflict_and_leaves_nodes_unmerged() {
    let options = policy(ConflictResolution::Error);
    let outcome = merge(&options).unwrap();
    assert!(outcome.graph.merged_nodes.is_empty());
    assert_eq!(outcome.graph.conflicts.len(), 1);
    let fields: Vec<&str> = outcome.graph.conflicts[0]
        .fields
        .iter()
        .map(|f| f.field.as_str())
        .collect();
    assert_eq!(fields, vec!["region", "tags"]);
    assert_eq!(outcome.graph.passthrough_nodes.len(), 4);
    assert!(outcome.enforce_conflict_policy(&options).is_ok());

    let strict = MergeOptions {
        fail_on_conflict: true,
        ..options
    };
    assert!(matches!(
        outcome.enforce_conflict_policy(&strict),
        Err(RollupError::MergeConflict { conflicts: 1 })
    ));
}

#[test]
fn edges_are_remapped_onto_the_aggregate() {
    let outcome = merge(&MergeOptions::default()).unwrap();
    let merged_id = outcome.graph.merged_nodes[0].id.clone();
    assert!(merged_id.starts_with("merged-"));
    assert_eq!(outcome.graph.edges.len(), 2);
    assert!(outcome.graph.edges.iter().all(|e| e.target == merged_id));
    assert!(outcome.graph.edges.iter().all(|e| e.cross_repo));
    assert_eq!(outcome.cross_repo_edges, 2);
    assert_eq!(outcome.matched_nodes, 2);
    assert_eq!(outcome.unmatched_nodes, 2);
}

#[test]
fn unmatched_nodes_drop_without_source_info() {
    let outcome = merge(&MergeOptions {
        preserve_source_info: false,
        ..MergeOptions::default()
    })
    .unwrap();
    assert!(outcome.graph.passthrough_nodes.is_empty());
    // Edges lose their unmatched endpoints.
    assert!(outcome.graph.edges.is_empty());
}

#[test]
fn max_nodes_is_enforced_on_the_aggregate() {
    let err = merge(&MergeOptions {
        max_nodes: Some(2),
        ..MergeOptions::default()
    })
    .unwrap_err();
    assert!(matches!(
        err,
        RollupError::MaxNodesExceeded {
            limit: 2,
            actual: 3
        }
    ));
}
