//! Version stamps for stochastic values.
//!
//! Every value assigned to a stochastic node gets a fresh stamp. An
//! evaluator's cache entry is valid exactly when the stamps of its ultimate
//! arguments match the stamps it was computed from.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identity of one assigned value.
///
/// Stamps are never reused, so two equal stamps always denote the same
/// assignment. Restoring a previous value restores its stamp too, which is
/// what lets a reverted state hit the cache again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp(u64);

impl Stamp {
    /// Generate a new unique stamp.
    ///
    /// Uses an atomic counter to ensure uniqueness across models and threads.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}
