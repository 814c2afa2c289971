//! Extended Closures
//!
//! Sampling algorithms only care about density-bearing nodes. These
//! closures reduce direct parent/child links to the nearest density-bearing
//! ancestors and descendants, collapsing deterministic intermediaries.
//!
//! Both functions assume the graph is acyclic. The model rejects cycles at
//! bind time, so within this crate that always holds.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexSet;

use super::node::{NodeId, NodeKind, Parent};
use super::registry::Graph;

/// Nearest density-bearing descendants of `children`.
///
/// Every deterministic member is replaced by its own children until none
/// remain. Stochastic and potential members are kept as they are.
pub fn extend_children<I>(graph: &Graph, children: I) -> IndexSet<NodeId>
where
    I: IntoIterator<Item = NodeId>,
{
    let mut extended = IndexSet::new();
    let mut visited = HashSet::new();
    let mut queue: VecDeque<NodeId> = children.into_iter().collect();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        let Some(relations) = graph.node(id) else {
            continue;
        };
        match relations.kind() {
            NodeKind::Deterministic => queue.extend(relations.children()),
            NodeKind::Stochastic | NodeKind::Potential => {
                extended.insert(id);
            }
        }
    }

    extended
}

/// Nearest stochastic ancestors reachable through `parents`.
///
/// Stochastic parents are kept. A deterministic parent is replaced by its
/// own extended parents, which the registry keeps current, so the collapse
/// is a single lookup rather than a walk. Containers contribute each member
/// the same way; constants contribute nothing.
pub fn extend_parents<'a, I>(graph: &Graph, parents: I) -> IndexSet<NodeId>
where
    I: IntoIterator<Item = &'a Parent>,
{
    let mut extended = IndexSet::new();

    for parent in parents {
        for member in graph.members(parent) {
            let Some(relations) = graph.node(member) else {
                continue;
            };
            match relations.kind() {
                NodeKind::Stochastic => {
                    extended.insert(member);
                }
                NodeKind::Deterministic => {
                    extended.extend(relations.extended_parents().iter().copied());
                }
                // Potentials carry no value and are never ancestors
                NodeKind::Potential => {}
            }
        }
    }

    extended
}
