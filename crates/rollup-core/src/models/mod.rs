pub mod blast_radius;
pub mod configuration;
pub mod execution;
pub mod matcher;
pub mod matching;
pub mod merge;

pub use blast_radius::{
    BlastRadiusQuery, BlastRadiusResult, BlastRadiusSummary, CrossRepoImpact, ImpactedNode,
    RiskLevel, TraversalDirection, DECAY_FACTOR, MAX_BLAST_RADIUS_DEPTH,
};
pub use configuration::{
    rollup_config_from_json, rollup_config_to_json, ConfigurationFilter, ConflictResolution,
    CreateRollupInput, MergeOptions, NestedMergePolicy, NodeTypeFilter, RollupConfiguration,
    RollupSchedule, RollupStatus, UpdateRollupInput,
};
pub use execution::{
    ExecuteOverrides, ExecutionError, ExecutionHandle, ExecutionPhase, ExecutionStatus,
    PhaseTiming, RollupExecution, RollupExecutionStats, Termination,
};
pub use matcher::{
    ArnComponent, ArnComponents, ArnMatcherConfig, MatcherCommon, MatcherConfig,
    NameMatcherConfig, RequiredTag, ResourceIdMatcherConfig, TagMatchMode, TagMatcherConfig,
};
pub use matching::{MatchResult, MatchScore, MatchStrategy};
pub use merge::{
    passthrough_id, AggregateEdge, FieldConflict, MatchInfo, MergeConflict, MergeProvenance,
    MergedGraph, MergedNode, SourceLocation,
};
