//! Potentials.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::graph::Parent;
use crate::lazy::{Arguments, ComputeFn};
use crate::value::Value;

/// Builder for a potential.
///
/// A potential adds an arbitrary log-density term over its parents to the
/// joint density. It has no value, so it can never be bound as a parent.
pub struct Potential {
    pub(crate) name: String,
    pub(crate) doc: Option<String>,
    pub(crate) parents: IndexMap<String, Parent>,
    pub(crate) logp: ComputeFn,
    pub(crate) cache_depth: Option<usize>,
}

impl Potential {
    pub fn new<F>(name: impl Into<String>, logp: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            doc: None,
            parents: IndexMap::new(),
            logp: Arc::new(logp),
            cache_depth: None,
        }
    }

    /// Bind a parent role.
    pub fn parent(mut self, key: impl Into<String>, parent: impl Into<Parent>) -> Self {
        self.parents.insert(key.into(), parent.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn cache_depth(mut self, depth: usize) -> Self {
        self.cache_depth = Some(depth);
        self
    }
}
