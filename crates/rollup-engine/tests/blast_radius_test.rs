//! Blast radius over merged graphs.

mod common;

use chrono::Utc;
use rollup_core::config::BlastRadiusConfig;
use rollup_core::models::*;
use rollup_core::{GraphEdge, RollupError, ScopedEdge};
use rollup_engine::{BlastRadiusEngine, GraphIndex, MergeEngine, PhaseControl};

use common::*;

/// `n1 → n2 → n3 → n4` inside one repository, nothing merged.
fn chain() -> MergedGraph {
    let nodes: Vec<_> = (1..=4)
        .map(|i| scoped("repo-x", resource(&format!("n{i}"), &format!("node-{i}"))))
        .collect();
    let edges: Vec<_> = (1..4)
        .map(|i| {
            ScopedEdge::new(
                "repo-x",
                GraphEdge::new(
                    format!("e{i}"),
                    format!("n{i}"),
                    format!("n{}", i + 1),
                    "depends_on",
                ),
            )
        })
        .collect();
    MergeEngine::new(&MergeOptions::default())
        .run(&nodes, &edges, &[], Utc::now(), PhaseControl::detached())
        .unwrap()
        .graph
}

/// Two repositories sharing one merged bucket, each with an upstream writer/reader.
fn shared_bucket() -> MergedGraph {
    let (a, b) = shared_bucket_graphs();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for graph in [a, b] {
        for node in graph.nodes {
            nodes.push(scoped(&graph.repository_id, node));
        }
        for edge in graph.edges {
            edges.push(ScopedEdge::new(graph.repository_id.clone(), edge));
        }
    }
    let matches = vec![MatchResult {
        source_node_id: "bucket".into(),
        source_repository_id: "repo-a".into(),
        target_node_id: "s3".into(),
        target_repository_id: "repo-b".into(),
        strategy: MatchStrategy::Name,
        confidence: 100,
        matched_attribute: "name".into(),
        source_value: "shared-bucket".into(),
        target_value: "shared-bucket".into(),
    }];
    MergeEngine::new(&MergeOptions::default())
        .run(&nodes, &edges, &matches, Utc::now(), PhaseControl::detached())
        .unwrap()
        .graph
}

fn analyze(graph: &MergedGraph, query: BlastRadiusQuery) -> Result<BlastRadiusResult, RollupError> {
    let engine = BlastRadiusEngine::new(&BlastRadiusConfig::default());
    let index = GraphIndex::build(graph);
    engine.analyze(&index, "rollup-1", "exec-1", &query)
}

#[test]
fn depth_zero_is_empty_and_low_risk() {
    let result = analyze(&chain(), BlastRadiusQuery::new(vec!["n1".into()]).with_max_depth(0)).unwrap();
    assert!(result.direct_impact.is_empty());
    assert!(result.indirect_impact.is_empty());
    assert_eq!(result.summary.risk_level, RiskLevel::Low);
    assert_eq!(result.summary.impact_score, 0.0);
    assert_eq!(result.seed_node_ids, vec!["repo-x::n1"]);
}

#[test]
fn downstream_depth_bounds_and_decay() {
    let result = analyze(&chain(), BlastRadiusQuery::new(vec!["n1".into()]).with_max_depth(2)).unwrap();
    let direct: Vec<&str> = result.direct_impact.iter().map(|n| n.node_id.as_str()).collect();
    assert_eq!(direct, vec!["repo-x::n2"]);
    assert_eq!(result.indirect_impact.len(), 1);
    let n3 = &result.indirect_impact[0];
    assert_eq!(n3.depth, 2);
    assert_eq!(n3.path, vec!["repo-x::n1", "repo-x::n2", "repo-x::n3"]);
    assert_eq!(n3.via_edge_type, "depends_on");
    assert!((result.summary.impact_score - (0.7 + 0.49)).abs() < 1e-9);
    assert_eq!(result.summary.by_depth.get(&2), Some(&1));
    assert_eq!(result.summary.cross_repo_count, 0);
}

#[test]
fn direct_only_when_indirect_excluded() {
    let query = BlastRadiusQuery {
        include_indirect: false,
        ..BlastRadiusQuery::new(vec!["n1".into()])
    };
    let result = analyze(&chain(), query).unwrap();
    assert_eq!(result.summary.total_impacted, 1);
    assert!(result.indirect_impact.is_empty());
}

#[test]
fn upstream_follows_incoming_edges() {
    let query = BlastRadiusQuery {
        direction: TraversalDirection::Upstream,
        ..BlastRadiusQuery::new(vec!["n4".into()])
    };
    let result = analyze(&chain(), query).unwrap();
    assert_eq!(result.summary.total_impacted, 3);
    assert_eq!(result.summary.direct_count, 1);
}

#[test]
fn cross_repository_impact_is_grouped_by_repo_pair() {
    let graph = shared_bucket();
    let downstream = analyze(&graph, BlastRadiusQuery::new(vec!["bucket".into()])).unwrap();
    assert_eq!(downstream.summary.total_impacted, 0);

    let query = BlastRadiusQuery {
        direction: TraversalDirection::Upstream,
        ..BlastRadiusQuery::new(vec!["s3".into()])
    };
    let result = analyze(&graph, query).unwrap();
    assert_eq!(result.summary.direct_count, 2);
    assert_eq!(result.summary.cross_repo_count, 2);
    assert_eq!(result.summary.risk_level, RiskLevel::Medium);
    let pairs: Vec<(&str, &str, &str)> = result
        .cross_repo_impact
        .iter()
        .map(|c| {
            (
                c.source_repository_id.as_str(),
                c.target_repository_id.as_str(),
                c.edge_type.as_str(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![("repo-a", "repo-b", "reads"), ("repo-b", "repo-a", "depends_on")]
    );

    let contained = BlastRadiusQuery {
        direction: TraversalDirection::Upstream,
        include_cross_repo: false,
        ..BlastRadiusQuery::new(vec!["s3".into()])
    };
    assert_eq!(analyze(&graph, contained).unwrap().summary.total_impacted, 0);
}

#[test]
fn edge_type_filter_limits_traversal() {
    let query = BlastRadiusQuery {
        direction: TraversalDirection::Upstream,
        edge_types: vec!["reads".into()],
        ..BlastRadiusQuery::new(vec!["bucket".into()])
    };
    let result = analyze(&shared_bucket(), query).unwrap();
    let names: Vec<&str> = result.direct_impact.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["reporter"]);
}

#[test]
fn invalid_queries_are_rejected() {
    let graph = chain();
    assert!(matches!(
        analyze(&graph, BlastRadiusQuery::new(vec![])),
        Err(RollupError::InvalidQuery(_))
    ));
    assert!(matches!(
        analyze(&graph, BlastRadiusQuery::new(vec!["n1".into()]).with_max_depth(21)),
        Err(RollupError::InvalidQuery(_))
    ));
    assert!(matches!(
        analyze(&graph, BlastRadiusQuery::new(vec!["ghost".into()])),
        Err(RollupError::NodeNotFound { .. })
    ));
}
