//! Matcher strategies and the matching coordinator.

pub mod arn;
pub mod blocking;
pub mod coordinator;
pub mod name;
pub mod resource_id;
pub mod strategy;
pub mod tag;

pub use coordinator::{MatchingCoordinator, MatchingOutcome};
pub use strategy::PreparedMatcher;
