//! `GraphSource` trait: per-repository graphs produced by the scanners.

use std::sync::Arc;

use crate::errors::RollupResult;
use crate::types::graph::RepositoryGraph;

/// Read-only access to scanned repository graphs.
///
/// Errors: `RepositoryNotFound` / `ScanNotFound` for unknown ids (not
/// retried), `GraphSourceUnavailable` for transient backend failures
/// (retried by the executor).
pub trait GraphSource: Send + Sync {
    /// Load one repository's graph at `scan_id`, or at its latest scan when `None`.
    fn load_graph(&self, repository_id: &str, scan_id: Option<&str>)
        -> RollupResult<RepositoryGraph>;
}

impl<T: GraphSource + ?Sized> GraphSource for Arc<T> {
    fn load_graph(
        &self,
        repository_id: &str,
        scan_id: Option<&str>,
    ) -> RollupResult<RepositoryGraph> {
        (**self).load_graph(repository_id, scan_id)
    }
}
