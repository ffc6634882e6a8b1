//! Blast radius configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlastRadiusConfig {
    pub default_max_depth: u32,
    /// Number of completed-execution graph indexes kept in memory.
    pub cache_capacity: u64,
}

impl Default for BlastRadiusConfig {
    fn default() -> Self {
        Self {
            default_max_depth: 5,
            cache_capacity: 32,
        }
    }
}
