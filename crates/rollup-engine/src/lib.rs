//! # rollup-engine
//!
//! Cross-repository rollup: matcher strategies, the matching coordinator,
//! union-find merging with conflict resolution, blast radius analysis over a
//! merged graph, and the execution lifecycle that drives
//! load → match → merge → store.

pub mod blast_radius;
pub mod control;
pub mod executor;
pub mod matching;
pub mod merge;
pub mod scheduling;
pub mod service;
pub mod validation;

pub use blast_radius::{BlastRadiusEngine, GraphIndex};
pub use control::{CancellationToken, PhaseControl};
pub use executor::RollupExecutor;
pub use matching::{MatchingCoordinator, MatchingOutcome, PreparedMatcher};
pub use merge::{MergeEngine, MergeOutcome};
pub use scheduling::should_trigger_on_scan;
pub use service::RollupService;
pub use validation::{validate_configuration, validate_overrides, validation_errors};
