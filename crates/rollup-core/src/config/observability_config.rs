//! Observability configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive used when neither `ROLLUP_LOG` nor `RUST_LOG` is set.
    pub log_filter: String,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            json: false,
        }
    }
}
