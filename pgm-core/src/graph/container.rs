//! Containers group several nodes so they can be bound as a single parent.

use indexmap::IndexMap;

use super::node::{ContainerId, NodeId, NodeKind};

/// A named, ordered group of value-bearing nodes.
///
/// Bound as a parent, a container passes the values of all its members and
/// registers the owner as a child of every member.
#[derive(Debug, Clone)]
pub struct Container {
    id: ContainerId,
    name: String,
    members: IndexMap<NodeId, NodeKind>,
}

impl Container {
    pub(crate) fn new(id: ContainerId, name: String, members: IndexMap<NodeId, NodeKind>) -> Self {
        Self { id, name, members }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All contained variables, in insertion order.
    pub fn variables(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.keys().copied()
    }

    pub fn stochastics(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.of_kind(NodeKind::Stochastic)
    }

    pub fn deterministics(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.of_kind(NodeKind::Deterministic)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn of_kind(&self, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.members
            .iter()
            .filter(move |(_, k)| **k == kind)
            .map(|(id, _)| *id)
    }
}
