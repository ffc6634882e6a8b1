//! Shared fixtures for the rollup-engine integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use rollup_core::models::*;
use rollup_core::{
    GraphEdge, GraphNode, GraphSource, RepositoryGraph, RollupEngineConfig, RollupError,
    RollupResult, RollupStore, ScopedNode, StorageError,
};
use rollup_core::events::RecordingEventPublisher;
use rollup_engine::RollupService;
use rollup_storage::{InMemoryGraphSource, InMemoryRollupStore};
use serde_json::{json, Value};

pub fn resource(id: &str, name: &str) -> GraphNode {
    GraphNode::new(id, "resource", name)
}

pub fn scoped(repo: &str, node: GraphNode) -> ScopedNode {
    ScopedNode::new(repo, node)
}

pub fn with_arn(node: GraphNode, arn: &str) -> GraphNode {
    node.with_metadata("arn", Value::String(arn.to_string()))
}

pub fn name_matcher() -> MatcherConfig {
    MatcherConfig::Name(NameMatcherConfig {
        common: MatcherCommon::default(),
        pattern: None,
        include_namespace: false,
        case_sensitive: false,
        fuzzy_threshold: None,
    })
}

pub fn arn_matcher() -> MatcherConfig {
    MatcherConfig::Arn(ArnMatcherConfig {
        common: MatcherCommon {
            enabled: true,
            priority: 90,
            min_confidence: 0,
        },
        pattern: None,
        allow_partial: false,
        components: ArnComponents {
            service: true,
            resource: true,
            ..ArnComponents::default()
        },
    })
}

/// Two repositories sharing one bucket by name, each with a consumer edge.
pub fn shared_bucket_graphs() -> (RepositoryGraph, RepositoryGraph) {
    let a = RepositoryGraph {
        repository_id: "repo-a".into(),
        scan_id: "scan-a1".into(),
        nodes: vec![
            resource("bucket", "shared-bucket").with_metadata("tags", json!({"env": "prod"})),
            resource("lambda", "ingest"),
        ],
        edges: vec![GraphEdge::new("e1", "lambda", "bucket", "depends_on")],
    };
    let b = RepositoryGraph {
        repository_id: "repo-b".into(),
        scan_id: "scan-b1".into(),
        nodes: vec![
            resource("s3", "shared-bucket").with_metadata("tags", json!({"team": "data"})),
            resource("reporter", "reporter"),
        ],
        edges: vec![GraphEdge::new("e1", "reporter", "s3", "reads")],
    };
    (a, b)
}

pub fn create_input(repos: &[&str]) -> CreateRollupInput {
    CreateRollupInput {
        name: "platform".into(),
        description: None,
        repository_ids: repos.iter().map(|r| r.to_string()).collect(),
        scan_ids: Default::default(),
        matchers: vec![name_matcher()],
        node_type_filter: NodeTypeFilter::default(),
        merge_options: MergeOptions::default(),
        schedule: None,
        activate: true,
    }
}

pub fn fast_engine_config() -> RollupEngineConfig {
    let mut config = RollupEngineConfig::default();
    config.executor.retry_base_delay_ms = 1;
    config.executor.retry_max_delay_ms = 5;
    config
}

pub struct Harness {
    pub service: RollupService,
    pub store: Arc<InMemoryRollupStore>,
    pub publisher: Arc<RecordingEventPublisher>,
}

pub fn harness(source: Arc<dyn GraphSource>) -> Harness {
    harness_with(fast_engine_config(), source)
}

pub fn harness_with(config: RollupEngineConfig, source: Arc<dyn GraphSource>) -> Harness {
    let store = Arc::new(InMemoryRollupStore::new());
    let publisher = Arc::new(RecordingEventPublisher::new());
    let service = RollupService::new(&config, store.clone(), source, publisher.clone());
    Harness {
        service,
        store,
        publisher,
    }
}

pub fn registered_source() -> Arc<InMemoryGraphSource> {
    let (a, b) = shared_bucket_graphs();
    Arc::new(InMemoryGraphSource::new().with_graph(a).with_graph(b))
}

/// Blocks every load until released.
pub struct GatedSource {
    pub inner: Arc<InMemoryGraphSource>,
    pub released: AtomicBool,
    pub entered: AtomicBool,
}

impl GatedSource {
    pub fn new(inner: Arc<InMemoryGraphSource>) -> Self {
        Self {
            inner,
            released: AtomicBool::new(false),
            entered: AtomicBool::new(false),
        }
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

impl GraphSource for GatedSource {
    fn load_graph(&self, repository_id: &str, scan_id: Option<&str>) -> RollupResult<RepositoryGraph> {
        self.entered.store(true, Ordering::SeqCst);
        while !self.released.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.inner.load_graph(repository_id, scan_id)
    }
}

/// Sleeps before every load.
pub struct SlowSource {
    pub inner: Arc<InMemoryGraphSource>,
    pub delay: Duration,
}

impl GraphSource for SlowSource {
    fn load_graph(&self, repository_id: &str, scan_id: Option<&str>) -> RollupResult<RepositoryGraph> {
        std::thread::sleep(self.delay);
        self.inner.load_graph(repository_id, scan_id)
    }
}

/// Fails the first `failures` loads as unavailable.
pub struct FlakySource {
    pub inner: Arc<InMemoryGraphSource>,
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl GraphSource for FlakySource {
    fn load_graph(&self, repository_id: &str, scan_id: Option<&str>) -> RollupResult<RepositoryGraph> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(RollupError::GraphSourceUnavailable {
                reason: format!("backend down (call {call})"),
            });
        }
        self.inner.load_graph(repository_id, scan_id)
    }
}

/// In-memory store that remembers which threads wrote executions.
pub struct ThreadTrackingStore {
    pub inner: InMemoryRollupStore,
    pub execution_writers: Mutex<Vec<ThreadId>>,
}

impl ThreadTrackingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryRollupStore::new(),
            execution_writers: Mutex::new(Vec::new()),
        }
    }

    pub fn writers(&self) -> Vec<ThreadId> {
        self.execution_writers.lock().unwrap().clone()
    }
}

impl RollupStore for ThreadTrackingStore {
    fn insert_configuration(&self, config: &RollupConfiguration) -> Result<(), StorageError> {
        self.inner.insert_configuration(config)
    }
    fn get_configuration(&self, id: &str) -> Result<Option<RollupConfiguration>, StorageError> {
        self.inner.get_configuration(id)
    }
    fn update_configuration(
        &self,
        config: &RollupConfiguration,
        expected_version: u64,
    ) -> Result<RollupConfiguration, StorageError> {
        self.inner.update_configuration(config, expected_version)
    }
    fn list_configurations(
        &self,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<RollupConfiguration>, StorageError> {
        self.inner.list_configurations(filter)
    }
    fn delete_configuration(&self, id: &str) -> Result<bool, StorageError> {
        self.inner.delete_configuration(id)
    }
    fn insert_execution(&self, execution: &RollupExecution) -> Result<(), StorageError> {
        self.inner.insert_execution(execution)
    }
    fn get_execution(&self, id: &str) -> Result<Option<RollupExecution>, StorageError> {
        self.inner.get_execution(id)
    }
    fn update_execution(&self, execution: &RollupExecution) -> Result<(), StorageError> {
        self.execution_writers
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        self.inner.update_execution(execution)
    }
    fn link_retry(&self, previous_id: &str, next_id: &str) -> Result<(), StorageError> {
        self.execution_writers
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        self.inner.link_retry(previous_id, next_id)
    }
    fn list_executions(
        &self,
        rollup_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RollupExecution>, StorageError> {
        self.inner.list_executions(rollup_id, limit)
    }
    fn save_merged_graph(&self, execution_id: &str, graph: &MergedGraph) -> Result<(), StorageError> {
        self.inner.save_merged_graph(execution_id, graph)
    }
    fn load_merged_graph(&self, execution_id: &str) -> Result<Option<MergedGraph>, StorageError> {
        self.inner.load_merged_graph(execution_id)
    }
    fn save_match_results(&self, execution_id: &str, matches: &[MatchResult]) -> Result<(), StorageError> {
        self.inner.save_match_results(execution_id, matches)
    }
    fn load_match_results(&self, execution_id: &str) -> Result<Vec<MatchResult>, StorageError> {
        self.inner.load_match_results(execution_id)
    }
}

/// Poll until `done` holds or two seconds pass.
pub async fn eventually(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    done()
}
