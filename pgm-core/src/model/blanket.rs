//! Markov-blanket relations.
//!
//! Derived on every call from the extended parent and child sets the
//! registry maintains. Only stochastic nodes have a Markov blanket.

use indexmap::IndexSet;

use crate::error::{Error, Result};
use crate::graph::{NodeId, NodeKind};

use super::Model;

impl Model {
    /// Every extended parent of every extended child of `id`, plus `id`.
    pub fn coparents(&self, id: NodeId) -> Result<IndexSet<NodeId>> {
        self.require_stochastic(id)?;

        let mut coparents = IndexSet::new();
        for &child in self.extended_children(id)? {
            coparents.extend(self.extended_parents(child)?.iter().copied());
        }
        coparents.insert(id);
        Ok(coparents)
    }

    /// Coparents, extended parents and extended children of `id`, without
    /// potentials.
    pub fn moral_neighbors(&self, id: NodeId) -> Result<IndexSet<NodeId>> {
        let mut neighbors = self.coparents(id)?;
        neighbors.extend(self.extended_parents(id)?.iter().copied());
        neighbors.extend(self.extended_children(id)?.iter().copied());
        neighbors.retain(|&n| self.graph.kind(n) != Some(NodeKind::Potential));
        Ok(neighbors)
    }

    /// Moral neighbors of `id` together with `id` itself.
    pub fn markov_blanket(&self, id: NodeId) -> Result<IndexSet<NodeId>> {
        let mut blanket = self.moral_neighbors(id)?;
        blanket.insert(id);
        Ok(blanket)
    }

    fn require_stochastic(&self, id: NodeId) -> Result<()> {
        let variable = self.variable(id)?;
        match variable.kind() {
            NodeKind::Stochastic => Ok(()),
            kind => Err(Error::Unsupported {
                name: variable.name.clone(),
                kind,
                operation: "Markov-blanket relations",
            }),
        }
    }
}
