//! Deterministic variables.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::graph::Parent;
use crate::lazy::{Arguments, ComputeFn};
use crate::value::Value;

/// Builder for a deterministic node.
///
/// A deterministic node's value is a pure function of its parents. It is
/// never assigned directly and has no log-density.
pub struct Deterministic {
    pub(crate) name: String,
    pub(crate) doc: Option<String>,
    pub(crate) parents: IndexMap<String, Parent>,
    pub(crate) eval: ComputeFn,
    pub(crate) trace: bool,
    pub(crate) cache_depth: Option<usize>,
}

impl Deterministic {
    pub fn new<F>(name: impl Into<String>, eval: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            doc: None,
            parents: IndexMap::new(),
            eval: Arc::new(eval),
            trace: true,
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

    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn cache_depth(mut self, depth: usize) -> Self {
        self.cache_depth = Some(depth);
        self
    }
}
