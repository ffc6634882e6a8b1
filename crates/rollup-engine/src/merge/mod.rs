//! Merge engine: union-find components and conflict resolution.

pub mod components;
pub mod conflict;
pub mod engine;

pub use conflict::{merge_values, resolve, Resolution};
pub use engine::{merged_node_id, MergeEngine, MergeOutcome};
