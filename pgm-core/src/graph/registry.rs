//! Relation Registry
//!
//! The registry owns every relation set in the graph: `children` (reference
//! counted per owner/parent pair), `extended_parents` and
//! `extended_children`. Nodes never mutate these sets themselves; the
//! model routes every binding change through [`Graph::bind`],
//! [`Graph::unbind`] and [`Graph::refresh_extended_parents`], so the
//! bidirectional invariants are enforced in one place.
//!
//! # Invariants
//!
//! - A node appears in `children` of every variable it binds, directly or
//!   through a container, with a count equal to the number of such bindings.
//! - `extended_parents` of a node equals `extend_parents` of its bindings.
//! - For an attached density-bearing node `c`, `p` is in
//!   `c.extended_parents` exactly when `c` is in `p.extended_children`.

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::closure::extend_parents;
use super::container::Container;
use super::node::{ContainerId, NodeId, NodeKind, Parent, Relations};

/// The relation registry for all nodes and containers of a model.
#[derive(Debug, Default)]
pub struct Graph {
    /// All nodes in the graph, indexed by ID.
    nodes: IndexMap<NodeId, Relations>,

    containers: IndexMap<ContainerId, Container>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no relations yet.
    pub(crate) fn insert_node(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes.insert(id, Relations::new(kind));
    }

    /// Remove a node's relation record.
    ///
    /// The caller must detach the node first; any remaining registrations
    /// elsewhere would dangle.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<Relations> {
        self.nodes.shift_remove(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Relations> {
        self.nodes.get(&id)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(Relations::kind)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether `id` is registered with its parents. Unknown nodes are not.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(Relations::is_attached)
    }

    pub(crate) fn set_attached(&mut self, id: NodeId, attached: bool) {
        if let Some(relations) = self.nodes.get_mut(&id) {
            relations.set_attached(attached);
        }
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub(crate) fn insert_container(&mut self, container: Container) {
        self.containers.insert(container.id(), container);
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(&id)
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> + '_ {
        self.containers.values()
    }

    /// The variables a parent reference points at.
    pub fn members(&self, parent: &Parent) -> SmallVec<[NodeId; 4]> {
        match parent {
            Parent::Node(id) => SmallVec::from_elem(*id, 1),
            Parent::Container(id) => self
                .containers
                .get(id)
                .map(|c| c.variables().collect())
                .unwrap_or_default(),
            Parent::Constant(_) => SmallVec::new(),
        }
    }

    /// Register `owner` as a child of every variable `parent` points at.
    pub(crate) fn bind(&mut self, owner: NodeId, parent: &Parent) {
        for member in self.members(parent) {
            if let Some(relations) = self.nodes.get_mut(&member) {
                relations.add_child(owner);
            }
        }
    }

    /// Release one registration of `owner` on every variable `parent`
    /// points at.
    pub(crate) fn unbind(&mut self, owner: NodeId, parent: &Parent) {
        for member in self.members(parent) {
            if let Some(relations) = self.nodes.get_mut(&member) {
                relations.release_child(owner);
            }
        }
    }

    /// Recompute `owner`'s extended parents from scratch and, if the owner
    /// is attached and density-bearing, move its extended-child
    /// registrations from the old set to the new one.
    pub(crate) fn refresh_extended_parents<'a, I>(&mut self, owner: NodeId, parents: I)
    where
        I: IntoIterator<Item = &'a Parent>,
    {
        let Some(registered) = self
            .nodes
            .get(&owner)
            .map(|r| r.is_attached() && r.kind().is_density_bearing())
        else {
            return;
        };

        let extended = extend_parents(self, parents);

        if registered {
            self.deregister_extended(owner);
        }
        if let Some(relations) = self.nodes.get_mut(&owner) {
            relations.set_extended_parents(extended);
        }
        if registered {
            self.register_extended(owner);
        }
    }

    /// Add `owner` to the extended children of each of its extended parents.
    pub(crate) fn register_extended(&mut self, owner: NodeId) {
        for parent in self.extended_parents_of(owner) {
            if let Some(relations) = self.nodes.get_mut(&parent) {
                relations.add_extended_child(owner);
            }
        }
    }

    /// Remove `owner` from the extended children of each of its extended
    /// parents.
    pub(crate) fn deregister_extended(&mut self, owner: NodeId) {
        for parent in self.extended_parents_of(owner) {
            if let Some(relations) = self.nodes.get_mut(&parent) {
                relations.remove_extended_child(owner);
            }
        }
    }

    fn extended_parents_of(&self, owner: NodeId) -> SmallVec<[NodeId; 8]> {
        self.nodes
            .get(&owner)
            .map(|r| r.extended_parents().iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (Graph, NodeId, NodeId, NodeId) {
        // s1 -> d1 -> s2
        let mut graph = Graph::new();
        let s1 = NodeId::new();
        let d1 = NodeId::new();
        let s2 = NodeId::new();
        graph.insert_node(s1, NodeKind::Stochastic);
        graph.insert_node(d1, NodeKind::Deterministic);
        graph.insert_node(s2, NodeKind::Stochastic);

        let d1_parents = [Parent::Node(s1)];
        graph.bind(d1, &d1_parents[0]);
        graph.refresh_extended_parents(d1, &d1_parents);

        let s2_parents = [Parent::Node(d1)];
        graph.bind(s2, &s2_parents[0]);
        graph.refresh_extended_parents(s2, &s2_parents);

        (graph, s1, d1, s2)
    }

    #[test]
    fn bind_and_unbind_track_children() {
        let (mut graph, s1, d1, _) = chain();
        assert_eq!(graph.node(s1).unwrap().references_from(d1), 1);

        graph.unbind(d1, &Parent::Node(s1));
        assert_eq!(graph.node(s1).unwrap().child_count(), 0);
    }

    #[test]
    fn deterministic_is_collapsed_out() {
        let (graph, s1, d1, s2) = chain();

        let s2_parents = graph.node(s2).unwrap().extended_parents();
        assert_eq!(s2_parents.iter().copied().collect::<Vec<_>>(), vec![s1]);

        let s1_children = graph.node(s1).unwrap().extended_children();
        assert_eq!(s1_children.iter().copied().collect::<Vec<_>>(), vec![s2]);

        // Deterministic nodes never collect extended children
        assert!(graph.node(d1).unwrap().extended_children().is_empty());
    }

    #[test]
    fn detached_nodes_do_not_register_extended_children() {
        let mut graph = Graph::new();
        let s1 = NodeId::new();
        let s2 = NodeId::new();
        graph.insert_node(s1, NodeKind::Stochastic);
        graph.insert_node(s2, NodeKind::Stochastic);
        graph.nodes.get_mut(&s2).unwrap().set_attached(false);

        graph.refresh_extended_parents(s2, &[Parent::Node(s1)]);

        assert!(graph.node(s2).unwrap().extended_parents().contains(&s1));
        assert!(graph.node(s1).unwrap().extended_children().is_empty());
    }

    #[test]
    fn container_members_are_bound_individually() {
        let mut graph = Graph::new();
        let a = NodeId::new();
        let b = NodeId::new();
        let owner = NodeId::new();
        graph.insert_node(a, NodeKind::Stochastic);
        graph.insert_node(b, NodeKind::Stochastic);
        graph.insert_node(owner, NodeKind::Potential);

        let mut members = IndexMap::new();
        members.insert(a, NodeKind::Stochastic);
        members.insert(b, NodeKind::Stochastic);
        let id = ContainerId::new();
        graph.insert_container(Container::new(id, "pair".into(), members));

        graph.bind(owner, &Parent::Container(id));
        assert_eq!(graph.node(a).unwrap().references_from(owner), 1);
        assert_eq!(graph.node(b).unwrap().references_from(owner), 1);

        graph.unbind(owner, &Parent::Container(id));
        assert_eq!(graph.node(a).unwrap().child_count(), 0);
        assert_eq!(graph.node(b).unwrap().child_count(), 0);
    }
}
