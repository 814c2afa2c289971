//! Model configuration.

use serde::{Deserialize, Serialize};

/// Number of memoized results each evaluator keeps unless overridden.
pub const DEFAULT_CACHE_DEPTH: usize = 2;

/// Settings shared by every node of a [`Model`](crate::Model).
///
/// Individual builders may override these per node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// How many value or log-density computations each evaluator memoizes.
    ///
    /// A depth of two lets a sampler propose a value, reject it and revert
    /// without recomputing the log-density of the restored state.
    pub default_cache_depth: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_cache_depth: DEFAULT_CACHE_DEPTH,
        }
    }
}
