//! Dependency Graph
//!
//! This module implements the graph of stochastic, deterministic and
//! potential nodes and the relations sampling algorithms need.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are stochastic variables, deterministic functions of their
//!   parents, or potentials (free-standing log-density terms)
//! - Edges represent parent bindings: if A binds B as a parent, A is one of
//!   B's children
//!
//! On top of the direct edges the registry maintains the extended
//! relations: the nearest stochastic ancestors of every node and the
//! nearest density-bearing descendants of every density-bearing node, with
//! deterministic nodes collapsed out.
//!
//! # Design Decisions
//!
//! 1. Relations live in a central registry rather than on the nodes, so
//!    every mutation goes through the same reference-counting code.
//!
//! 2. Extended parents are recomputed from scratch whenever a binding
//!    changes. Extended children are patched incrementally by the same
//!    call, which keeps both directions in sync.
//!
//! 3. The graph is indexed by node ID for O(1) lookups.

mod closure;
mod container;
mod node;
mod registry;

pub use closure::{extend_children, extend_parents};
pub use container::Container;
pub use node::{ContainerId, NodeId, NodeKind, Parent, Relations};
pub use registry::Graph;
