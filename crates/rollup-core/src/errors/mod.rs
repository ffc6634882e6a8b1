pub mod error_code;
mod recovery;
mod rollup_error;
mod storage_error;
mod validation_error;

pub use recovery::RecoveryAction;
pub use rollup_error::{RollupError, RollupResult};
pub use storage_error::{
    StorageError, ENTITY_CONFIGURATION, ENTITY_EXECUTION, ENTITY_MERGED_GRAPH,
};
pub use validation_error::ValidationError;
