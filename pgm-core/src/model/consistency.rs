//! Consistency checking.
//!
//! Recomputes every relation set from the live parent bindings and compares
//! it with what the registry holds. The registry is maintained
//! incrementally, so this is the reference it is tested against.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::error::{Error, Result};
use crate::graph::{NodeId, NodeKind};

use super::Model;

impl Model {
    /// Verify every relation invariant of the graph.
    ///
    /// Checks, in order:
    ///
    /// 1. Child registrations: each attached node is registered on every
    ///    variable it binds, once per binding.
    /// 2. Extended parents equal a from-scratch closure of the bindings.
    /// 3. Extended parents and extended children mirror each other for
    ///    attached density-bearing nodes.
    ///
    /// Returns [`Error::Inconsistent`] describing the first violation.
    pub fn check_consistency(&self) -> Result<()> {
        self.check_children()?;
        self.check_extended_parents()?;
        self.check_extended_children()
    }

    fn check_children(&self) -> Result<()> {
        let mut expected: HashMap<(NodeId, NodeId), usize> = HashMap::new();
        for (&owner, variable) in &self.variables {
            if !self.graph.is_attached(owner) {
                continue;
            }
            for parent in variable.parents.references() {
                for member in self.graph.members(parent) {
                    *expected.entry((member, owner)).or_insert(0) += 1;
                }
            }
        }

        let mut registered = 0;
        for id in self.graph.nodes() {
            let Some(relations) = self.graph.node(id) else {
                continue;
            };
            for child in relations.children() {
                registered += 1;
                let want = expected.get(&(id, child)).copied().unwrap_or(0);
                let have = relations.references_from(child);
                if want != have {
                    return Err(Error::Inconsistent(format!(
                        "{} holds {} registrations on {}, expected {}",
                        self.label(child),
                        have,
                        self.label(id),
                        want
                    )));
                }
            }
        }

        if registered != expected.len() {
            let missing = expected.keys().find(|(parent, child)| {
                self.graph
                    .node(*parent)
                    .map_or(true, |r| r.references_from(*child) == 0)
            });
            if let Some((parent, child)) = missing {
                return Err(Error::Inconsistent(format!(
                    "{} binds {} but is not registered as its child",
                    self.label(*child),
                    self.label(*parent)
                )));
            }
        }
        Ok(())
    }

    fn check_extended_parents(&self) -> Result<()> {
        let mut memo = HashMap::new();
        for &id in self.variables.keys() {
            let expected = self.closure_from_scratch(id, &mut memo);
            let stored = self.extended_parents(id)?;
            if !same_members(&expected, stored) {
                return Err(Error::Inconsistent(format!(
                    "extended parents of {} are {:?}, expected {:?}",
                    self.label(id),
                    stored,
                    expected
                )));
            }
        }
        Ok(())
    }

    fn check_extended_children(&self) -> Result<()> {
        for &id in self.variables.keys() {
            let kind = self.graph.kind(id);
            let registered = self.graph.is_attached(id) && kind.is_some_and(|k| k.is_density_bearing());

            for &parent in self.extended_parents(id)? {
                let listed = self.extended_children(parent)?.contains(&id);
                if listed != registered {
                    return Err(Error::Inconsistent(format!(
                        "{} is {}listed among the extended children of {}",
                        self.label(id),
                        if listed { "" } else { "not " },
                        self.label(parent)
                    )));
                }
            }

            for &child in self.extended_children(id)? {
                if !self.extended_parents(child)?.contains(&id) || !self.graph.is_attached(child) {
                    return Err(Error::Inconsistent(format!(
                        "{} lists {} as an extended child, but not the other way around",
                        self.label(id),
                        self.label(child)
                    )));
                }
            }

            if kind == Some(NodeKind::Deterministic) && !self.extended_children(id)?.is_empty() {
                return Err(Error::Inconsistent(format!(
                    "deterministic {} has extended children",
                    self.label(id)
                )));
            }
        }
        Ok(())
    }

    /// Nearest stochastic ancestors of `id`, following bindings only.
    fn closure_from_scratch(
        &self,
        id: NodeId,
        memo: &mut HashMap<NodeId, IndexSet<NodeId>>,
    ) -> IndexSet<NodeId> {
        if let Some(done) = memo.get(&id) {
            return done.clone();
        }

        let mut closure = IndexSet::new();
        if let Some(variable) = self.variables.get(&id) {
            for parent in variable.parents.references() {
                for member in self.graph.members(parent) {
                    match self.graph.kind(member) {
                        Some(NodeKind::Stochastic) => {
                            closure.insert(member);
                        }
                        Some(NodeKind::Deterministic) => {
                            let inner = self.closure_from_scratch(member, memo);
                            closure.extend(inner);
                        }
                        _ => {}
                    }
                }
            }
        }

        memo.insert(id, closure.clone());
        closure
    }

    fn label(&self, id: NodeId) -> String {
        match self.variables.get(&id) {
            Some(variable) => format!("`{}`", variable.name),
            None => id.to_string(),
        }
    }
}

fn same_members(a: &IndexSet<NodeId>, b: &IndexSet<NodeId>) -> bool {
    a.len() == b.len() && a.iter().all(|id| b.contains(id))
}
