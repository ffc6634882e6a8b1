//! Collaborator seams: where graphs come from and where rollup state lives.

pub mod graph_source;
pub mod store;

pub use graph_source::GraphSource;
pub use store::RollupStore;
