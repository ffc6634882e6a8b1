pub mod blast_radius_config;
pub mod executor_config;
pub mod matching_config;
pub mod observability_config;
pub mod storage_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use blast_radius_config::BlastRadiusConfig;
pub use executor_config::ExecutorConfig;
pub use matching_config::MatchingConfig;
pub use observability_config::ObservabilityConfig;
pub use storage_config::StorageConfig;

use crate::errors::{RollupError, RollupResult};

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RollupEngineConfig {
    pub matching: MatchingConfig,
    pub executor: ExecutorConfig,
    pub blast_radius: BlastRadiusConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
}

impl RollupEngineConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> RollupResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RollupError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&raw).map_err(|e| RollupError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = RollupEngineConfig::from_toml("").unwrap();
        assert_eq!(config, RollupEngineConfig::default());
        assert_eq!(config.executor.max_attempts, 3);
        assert_eq!(config.blast_radius.default_max_depth, 5);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = RollupEngineConfig::from_toml(
            r#"
            [executor]
            max_attempts = 5

            [storage]
            db_path = "/var/lib/rollup/rollup.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.executor.max_attempts, 5);
        assert_eq!(config.executor.retry_base_delay_ms, 1_000);
        assert_eq!(
            config.storage.db_path.as_deref(),
            Some(Path::new("/var/lib/rollup/rollup.db"))
        );
        assert!(config.matching.parallel);
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RollupEngineConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, RollupError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollup.toml");
        std::fs::write(&path, "[matching]\nparallel = false\n").unwrap();
        let config = RollupEngineConfig::load(&path).unwrap();
        assert!(!config.matching.parallel);
    }
}
