//! Shared value types: hash collections and the per-repository graph model.

pub mod collections;
pub mod graph;
