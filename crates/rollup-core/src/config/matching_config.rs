//! Matching phase configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Score blocks on the rayon pool instead of sequentially.
    pub parallel: bool,
    /// Blocks larger than this are logged; 0 disables the warning.
    pub warn_block_size: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            warn_block_size: 5_000,
        }
    }
}
