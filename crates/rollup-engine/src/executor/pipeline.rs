//! The blocking body of one attempt: load → match → merge → store.
//!
//! Runs on a blocking thread. Cancellation is checked before every phase and
//! between blocks/components inside matching and merging.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rollup_core::config::MatchingConfig;
use rollup_core::events::{
    ExecutionCompletedEvent, ExecutionStartedEvent, MatchingCompletedEvent, MergeCompletedEvent,
    MergeConflictEvent, PhaseCompletedEvent, PhaseStartedEvent,
};
use rollup_core::models::{
    ExecuteOverrides, ExecutionPhase, MatchResult, MergedGraph, RollupConfiguration,
    RollupExecutionStats,
};
use rollup_core::{
    EventPayload, FxHashSet, GraphSource, RollupError, RollupResult, RollupStore, ScopedEdge,
    ScopedNode,
};
use tracing::{debug, info};

use super::lifecycle::ExecutionLifecycle;
use crate::control::{CancellationToken, PhaseControl};
use crate::matching::{MatchingCoordinator, PreparedMatcher};
use crate::merge::MergeEngine;

/// Everything one attempt needs, owned so it can move onto a blocking thread.
pub struct Attempt {
    pub config: RollupConfiguration,
    pub overrides: ExecuteOverrides,
    pub matching: MatchingConfig,
    pub graph_source: Arc<dyn GraphSource>,
    pub store: Arc<dyn RollupStore>,
    pub lifecycle: Arc<ExecutionLifecycle>,
    pub token: CancellationToken,
}

struct Loaded {
    nodes: Vec<ScopedNode>,
    edges: Vec<ScopedEdge>,
    scan_ids: BTreeMap<String, String>,
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_default() += 1;
}

impl Attempt {
    fn execution_id(&self) -> String {
        self.lifecycle.execution_id()
    }

    /// Scans pinned by the request, else by the configuration.
    fn requested_scan_ids(&self) -> BTreeMap<String, String> {
        let mut scans = self.config.scan_ids.clone();
        if let Some(overrides) = &self.overrides.scan_ids {
            scans.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        scans.retain(|repository_id, _| self.config.repository_ids.contains(repository_id));
        scans
    }

    /// Run the attempt to `completed`. Failure, cancellation and timeout are
    /// returned to the executor, which records the terminal event.
    pub fn run(&self) -> RollupResult<()> {
        let started = Instant::now();
        let execution_id = self.execution_id();
        let rollup_id = self.config.id.clone();
        let requested = self.requested_scan_ids();
        let snapshot = self.lifecycle.snapshot()?;

        self.lifecycle
            .record(EventPayload::ExecutionStarted(ExecutionStartedEvent {
                execution_id: execution_id.clone(),
                rollup_id: rollup_id.clone(),
                attempt: snapshot.attempt,
                repository_ids: self.config.repository_ids.clone(),
                requested_scan_ids: requested.clone(),
            }))?;
        info!(%execution_id, %rollup_id, attempt = snapshot.attempt, "rollup execution started");

        let mut stats = RollupExecutionStats::default();

        let loaded = self.phase(ExecutionPhase::Loading, &mut stats, |control, stats| {
            self.load(&requested, control, stats)
        })?;
        let scan_ids = loaded.value.scan_ids.clone();
        self.complete_phase(ExecutionPhase::Loading, &stats, scan_ids, &loaded.timer)?;
        let loaded = loaded.value;

        let matched = self.phase(ExecutionPhase::Matching, &mut stats, |control, stats| {
            self.match_nodes(&loaded.nodes, control, stats)
        })?;
        self.complete_phase(ExecutionPhase::Matching, &stats, BTreeMap::new(), &matched.timer)?;
        let matches = matched.value;

        let merged = self.phase(ExecutionPhase::Merging, &mut stats, |control, stats| {
            self.merge(&loaded, &matches, control, stats)
        })?;
        self.complete_phase(ExecutionPhase::Merging, &stats, BTreeMap::new(), &merged.timer)?;
        let graph = merged.value;

        let stored = self.phase(ExecutionPhase::Storing, &mut stats, |control, _| {
            self.persist(&graph, &matches, control)
        })?;
        self.complete_phase(ExecutionPhase::Storing, &stats, BTreeMap::new(), &stored.timer)?;

        stats.duration_ms = started.elapsed().as_millis() as u64;
        self.lifecycle
            .record(EventPayload::ExecutionCompleted(ExecutionCompletedEvent {
                execution_id: execution_id.clone(),
                rollup_id: rollup_id.clone(),
                duration_ms: stats.duration_ms,
                stats: stats.clone(),
            }))?;
        info!(
            %execution_id,
            %rollup_id,
            duration_ms = stats.duration_ms,
            merged_nodes = stats.merged_nodes,
            cross_repo_edges = stats.cross_repo_edges_created,
            "rollup execution completed"
        );
        Ok(())
    }

    /// Checkpoint, record phase start, run `body`. Errors carry the phase.
    fn phase<T>(
        &self,
        phase: ExecutionPhase,
        stats: &mut RollupExecutionStats,
        body: impl FnOnce(PhaseControl<'_>, &mut RollupExecutionStats) -> RollupResult<T>,
    ) -> RollupResult<Timed<T>> {
        self.token.check().map_err(|e| e.in_phase(phase))?;
        self.lifecycle
            .record(EventPayload::PhaseStarted(PhaseStartedEvent {
                execution_id: self.execution_id(),
                rollup_id: self.config.id.clone(),
                phase,
            }))
            .map_err(|e| e.in_phase(phase))?;
        debug!(execution_id = %self.execution_id(), %phase, "phase started");

        let timer = Instant::now();
        let lifecycle = Arc::clone(&self.lifecycle);
        let progress = move |percent: u8| lifecycle.report_progress(phase, percent);
        let control = PhaseControl::new(&self.token, &progress);
        let value = body(control, stats).map_err(|e| e.in_phase(phase))?;
        Ok(Timed { value, timer })
    }

    fn complete_phase(
        &self,
        phase: ExecutionPhase,
        stats: &RollupExecutionStats,
        scan_ids: BTreeMap<String, String>,
        timer: &Instant,
    ) -> RollupResult<()> {
        self.lifecycle
            .record(phase_completed(
                &self.execution_id(),
                &self.config.id,
                phase,
                stats,
                scan_ids,
                timer,
            ))
            .map(|_| ())
            .map_err(|e| e.in_phase(phase))
    }

    fn load(
        &self,
        requested: &BTreeMap<String, String>,
        control: PhaseControl<'_>,
        stats: &mut RollupExecutionStats,
    ) -> RollupResult<Loaded> {
        let filter = &self.config.node_type_filter;
        let total = self.config.repository_ids.len();
        let mut loaded = Loaded {
            nodes: Vec::new(),
            edges: Vec::new(),
            scan_ids: BTreeMap::new(),
        };

        for (i, repository_id) in self.config.repository_ids.iter().enumerate() {
            let scan_id = requested.get(repository_id).map(String::as_str);
            let graph = self.graph_source.load_graph(repository_id, scan_id)?;
            control.checkpoint()?;

            let mut kept: FxHashSet<&str> = FxHashSet::default();
            for node in &graph.nodes {
                if filter.accepts(&node.node_type) {
                    kept.insert(node.id.as_str());
                }
            }
            for node in &graph.nodes {
                if kept.contains(node.id.as_str()) {
                    stats.nodes_processed += 1;
                    bump(&mut stats.nodes_by_type, &node.node_type);
                    loaded.nodes.push(ScopedNode::new(repository_id.clone(), node.clone()));
                }
            }
            for edge in &graph.edges {
                if kept.contains(edge.source.as_str()) && kept.contains(edge.target.as_str()) {
                    stats.edges_processed += 1;
                    bump(&mut stats.edges_by_type, &edge.edge_type);
                    loaded.edges.push(ScopedEdge::new(repository_id.clone(), edge.clone()));
                }
            }
            debug!(
                %repository_id,
                scan_id = %graph.scan_id,
                nodes = graph.nodes.len(),
                edges = graph.edges.len(),
                "repository graph loaded"
            );
            loaded.scan_ids.insert(repository_id.clone(), graph.scan_id);
            control.report_fraction(i + 1, total);
        }
        Ok(loaded)
    }

    fn match_nodes(
        &self,
        nodes: &[ScopedNode],
        control: PhaseControl<'_>,
        stats: &mut RollupExecutionStats,
    ) -> RollupResult<Vec<MatchResult>> {
        let matchers = PreparedMatcher::prepare_all(&self.config.matchers)
            .map_err(|errors| RollupError::InvalidConfiguration { errors })?;
        let outcome = MatchingCoordinator::new(&matchers, self.matching.clone()).run(nodes, control)?;

        stats.matches_by_strategy = outcome.matches_by_strategy.clone();
        self.lifecycle
            .record(EventPayload::MatchingCompleted(MatchingCompletedEvent {
                execution_id: self.execution_id(),
                rollup_id: self.config.id.clone(),
                blocks: outcome.blocks,
                candidate_pairs: outcome.candidate_pairs,
                total_matches: outcome.matches.len(),
                matches_by_strategy: outcome.matches_by_strategy,
            }))?;
        Ok(outcome.matches)
    }

    fn merge(
        &self,
        loaded: &Loaded,
        matches: &[MatchResult],
        control: PhaseControl<'_>,
        stats: &mut RollupExecutionStats,
    ) -> RollupResult<MergedGraph> {
        let options = &self.config.merge_options;
        let mut engine = MergeEngine::new(options);
        if !self.matching.parallel {
            engine = engine.sequential();
        }
        let outcome = engine.run(&loaded.nodes, &loaded.edges, matches, Utc::now(), control)?;

        for conflict in &outcome.graph.conflicts {
            self.lifecycle
                .record(EventPayload::MergeConflict(MergeConflictEvent {
                    execution_id: self.execution_id(),
                    rollup_id: self.config.id.clone(),
                    component: conflict.component.clone(),
                    fields: conflict.fields.iter().map(|f| f.field.clone()).collect(),
                }))?;
        }
        outcome.enforce_conflict_policy(options)?;

        stats.matched_nodes = outcome.matched_nodes as u64;
        stats.unmatched_nodes = outcome.unmatched_nodes as u64;
        stats.merged_nodes = outcome.graph.merged_nodes.len() as u64;
        stats.cross_repo_edges_created = outcome.cross_repo_edges as u64;
        stats.merge_conflicts = outcome.graph.conflicts.len() as u64;

        self.lifecycle
            .record(EventPayload::MergeCompleted(MergeCompletedEvent {
                execution_id: self.execution_id(),
                rollup_id: self.config.id.clone(),
                merged_nodes: outcome.graph.merged_nodes.len(),
                passthrough_nodes: outcome.graph.passthrough_nodes.len(),
                cross_repo_edges: outcome.cross_repo_edges,
                conflicts: outcome.graph.conflicts.len(),
            }))?;
        Ok(outcome.graph)
    }

    fn persist(
        &self,
        graph: &MergedGraph,
        matches: &[MatchResult],
        control: PhaseControl<'_>,
    ) -> RollupResult<()> {
        let execution_id = self.execution_id();
        self.store.save_merged_graph(&execution_id, graph)?;
        control.report(50);
        if self.overrides.include_match_details {
            self.store.save_match_results(&execution_id, matches)?;
        }
        control.report(100);
        Ok(())
    }
}

struct Timed<T> {
    value: T,
    timer: Instant,
}

fn phase_completed(
    execution_id: &str,
    rollup_id: &str,
    phase: ExecutionPhase,
    stats: &RollupExecutionStats,
    scan_ids: BTreeMap<String, String>,
    timer: &Instant,
) -> EventPayload {
    EventPayload::PhaseCompleted(PhaseCompletedEvent {
        execution_id: execution_id.to_string(),
        rollup_id: rollup_id.to_string(),
        phase,
        duration_ms: timer.elapsed().as_millis() as u64,
        stats: stats.clone(),
        scan_ids,
    })
}
