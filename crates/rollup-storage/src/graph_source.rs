//! `InMemoryGraphSource`: serves registered repository graphs by scan.

use std::sync::RwLock;

use rustc_hash::FxHashMap;
use tracing::debug;

use rollup_core::{GraphSource, RepositoryGraph, RollupError, RollupResult};

/// Graphs keyed by repository, each repository holding its scans in
/// registration order. The latest scan is the last one registered.
#[derive(Default)]
pub struct InMemoryGraphSource {
    repositories: RwLock<FxHashMap<String, Vec<RepositoryGraph>>>,
}

impl InMemoryGraphSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scan. Re-registering a scan id replaces it and makes it the latest.
    pub fn register(&self, graph: RepositoryGraph) {
        debug!(
            repository_id = %graph.repository_id,
            scan_id = %graph.scan_id,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "registered repository graph"
        );
        if let Ok(mut repositories) = self.repositories.write() {
            let scans = repositories.entry(graph.repository_id.clone()).or_default();
            scans.retain(|g| g.scan_id != graph.scan_id);
            scans.push(graph);
        }
    }

    pub fn with_graph(self, graph: RepositoryGraph) -> Self {
        self.register(graph);
        self
    }
}

impl GraphSource for InMemoryGraphSource {
    fn load_graph(
        &self,
        repository_id: &str,
        scan_id: Option<&str>,
    ) -> RollupResult<RepositoryGraph> {
        let repositories = self
            .repositories
            .read()
            .map_err(|e| RollupError::GraphSourceUnavailable {
                reason: format!("graph registry lock poisoned: {e}"),
            })?;
        let scans = repositories
            .get(repository_id)
            .ok_or_else(|| RollupError::RepositoryNotFound {
                repository_id: repository_id.to_string(),
            })?;
        let graph = match scan_id {
            Some(scan_id) => scans.iter().find(|g| g.scan_id == scan_id).ok_or_else(|| {
                RollupError::ScanNotFound {
                    repository_id: repository_id.to_string(),
                    scan_id: scan_id.to_string(),
                }
            })?,
            None => scans.last().ok_or_else(|| RollupError::RepositoryNotFound {
                repository_id: repository_id.to_string(),
            })?,
        };
        Ok(graph.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_core::GraphNode;

    fn graph(repo: &str, scan: &str, node: &str) -> RepositoryGraph {
        RepositoryGraph {
            repository_id: repo.into(),
            scan_id: scan.into(),
            nodes: vec![GraphNode::new(node, "resource", node)],
            edges: vec![],
        }
    }

    #[test]
    fn latest_is_last_registered() {
        let source = InMemoryGraphSource::new()
            .with_graph(graph("repo-a", "s1", "old"))
            .with_graph(graph("repo-a", "s2", "new"));
        assert_eq!(source.load_graph("repo-a", None).unwrap().scan_id, "s2");
        assert_eq!(
            source.load_graph("repo-a", Some("s1")).unwrap().nodes[0].id,
            "old"
        );
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let source = InMemoryGraphSource::new().with_graph(graph("repo-a", "s1", "n"));
        assert!(matches!(
            source.load_graph("repo-x", None),
            Err(RollupError::RepositoryNotFound { .. })
        ));
        assert!(matches!(
            source.load_graph("repo-a", Some("s9")),
            Err(RollupError::ScanNotFound { .. })
        ));
    }
}
