//! # rollup-core
//!
//! Foundation crate for the cross-repository rollup engine.
//! Defines the graph and rollup data model, collaborator traits, errors with
//! stable codes, engine configuration, the lifecycle event envelope, and
//! tracing setup. Every other crate in the workspace depends on this.

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod tracing;
pub mod traits;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use config::RollupEngineConfig;
pub use errors::error_code::RollupErrorCode;
pub use errors::{RollupError, RollupResult, StorageError, ValidationError};
pub use events::{EventEnvelope, EventPayload, EventPublisher, RollupEventType};
pub use traits::{GraphSource, RollupStore};
pub use types::collections::{FxHashMap, FxHashSet};
pub use types::graph::{
    GraphEdge, GraphNode, Metadata, NodeKey, NodeLocation, RepositoryGraph, ScopedEdge,
    ScopedNode,
};
