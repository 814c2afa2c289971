//! Graph Nodes
//!
//! This module defines the identifiers, kinds and per-node relation records
//! that live in the dependency graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(u64);

impl ContainerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Carries a value and a log-density of that value given its parents.
    Stochastic,

    /// Carries a value computed purely from its parents.
    /// Collapsed out of every extended closure.
    Deterministic,

    /// Carries only a log-density term. Never a parent of anything.
    Potential,
}

impl NodeKind {
    /// Stochastic and potential nodes contribute a log-density term.
    pub fn is_density_bearing(&self) -> bool {
        matches!(self, NodeKind::Stochastic | NodeKind::Potential)
    }

    /// Stochastic and deterministic nodes expose a value.
    pub fn is_value_bearing(&self) -> bool {
        matches!(self, NodeKind::Stochastic | NodeKind::Deterministic)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Stochastic => write!(f, "stochastic"),
            NodeKind::Deterministic => write!(f, "deterministic"),
            NodeKind::Potential => write!(f, "potential"),
        }
    }
}

/// What a parent role is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Parent {
    /// Another node; its value is passed as the argument.
    Node(NodeId),

    /// A container; the values of all its members are passed.
    Container(ContainerId),

    /// A plain constant with no graph presence.
    Constant(Value),
}

impl Parent {
    /// Build a constant parent.
    pub fn constant(value: impl Into<Value>) -> Self {
        Parent::Constant(value.into())
    }
}

impl From<NodeId> for Parent {
    fn from(id: NodeId) -> Self {
        Parent::Node(id)
    }
}

impl From<ContainerId> for Parent {
    fn from(id: ContainerId) -> Self {
        Parent::Container(id)
    }
}

impl From<Value> for Parent {
    fn from(value: Value) -> Self {
        Parent::Constant(value)
    }
}

impl From<f64> for Parent {
    fn from(x: f64) -> Self {
        Parent::Constant(Value::Float(x))
    }
}

impl From<i64> for Parent {
    fn from(x: i64) -> Self {
        Parent::Constant(Value::Int(x))
    }
}

/// Relations of one node, as tracked by the registry.
#[derive(Debug)]
pub struct Relations {
    kind: NodeKind,

    /// Whether the node is currently registered with its parents.
    attached: bool,

    /// Nodes that bind this node as a parent, with the number of bindings
    /// (direct or through containers) each of them holds.
    children: IndexMap<NodeId, usize>,

    /// Nearest stochastic ancestors, deterministic nodes collapsed.
    extended_parents: IndexSet<NodeId>,

    /// Nearest density-bearing descendants, deterministic nodes collapsed.
    /// Always empty for deterministic nodes.
    extended_children: IndexSet<NodeId>,
}

impl Relations {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attached: true,
            children: IndexMap::new(),
            extended_parents: IndexSet::new(),
            extended_children: IndexSet::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.keys().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// How many bindings `child` holds on this node.
    pub fn references_from(&self, child: NodeId) -> usize {
        self.children.get(&child).copied().unwrap_or(0)
    }

    pub(crate) fn add_child(&mut self, child: NodeId) {
        *self.children.entry(child).or_insert(0) += 1;
    }

    /// Drop one binding held by `child`. The child leaves the set only
    /// when its last binding is released.
    pub(crate) fn release_child(&mut self, child: NodeId) {
        if let Some(count) = self.children.get_mut(&child) {
            *count -= 1;
            if *count == 0 {
                self.children.shift_remove(&child);
            }
        }
    }

    pub fn extended_parents(&self) -> &IndexSet<NodeId> {
        &self.extended_parents
    }

    pub(crate) fn set_extended_parents(&mut self, parents: IndexSet<NodeId>) {
        self.extended_parents = parents;
    }

    pub fn extended_children(&self) -> &IndexSet<NodeId> {
        &self.extended_children
    }

    pub(crate) fn add_extended_child(&mut self, child: NodeId) {
        self.extended_children.insert(child);
    }

    pub(crate) fn remove_extended_child(&mut self, child: NodeId) {
        self.extended_children.shift_remove(&child);
    }
}
