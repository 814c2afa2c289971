//! Graph Editing
//!
//! Rebinding a parent, detaching and re-attaching nodes, and removing them.
//!
//! # Rebind Sequence
//!
//! 1. Validate the new reference: it must exist, must not be a potential
//!    and must not close a cycle. Nothing has changed yet if this fails.
//! 2. Swap the binding and move the owner's child registration from the
//!    old reference to the new one. Registrations are reference counted,
//!    so the owner stays a child of the old parent while another role
//!    still binds it.
//! 3. Recompute extended parents from scratch for the owner and, if it is
//!    deterministic, for every node whose closure passes through it, moving
//!    their extended-child registrations along.
//! 4. Rebuild the evaluators of all affected nodes and force them in
//!    topological order.
//!
//! If step 4 fails, the old binding is swapped back in, the closures are
//! recomputed again and the previous evaluators, caches included, are
//! restored.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{NodeId, NodeKind, Parent};
use crate::lazy::LazyFunction;
use crate::variable::Variable;

use super::Model;

impl Model {
    /// Bind the parent role `key` of `owner` to a new reference.
    pub fn rebind(&mut self, owner: NodeId, key: &str, parent: impl Into<Parent>) -> Result<()> {
        let parent = parent.into();
        let variable = self.variable(owner)?;
        if !variable.parents.contains_key(key) {
            return Err(Error::UnknownParent {
                owner: variable.name.clone(),
                key: key.to_string(),
            });
        }
        self.validate_parent(Some(owner), &variable.name, key, &parent)?;

        debug!(node = %variable.name, key, "rebinding parent");
        let old = self.swap_binding(owner, key, parent)?;
        let affected = self.refresh_closure(owner);
        let previous = self.install_evaluators(&affected);

        if let Err(err) = self.force_evaluators(&affected, false) {
            debug!(node = %owner, key, error = %err, "rebind failed, rolling back");
            self.swap_binding(owner, key, old)?;
            self.refresh_closure(owner);
            self.restore_evaluators(previous);
            return Err(err);
        }
        Ok(())
    }

    /// Remove `id` from the relation sets of its parents.
    ///
    /// The node keeps its bindings and stays in the model; its own children
    /// still see it. Detaching a detached node does nothing.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let variable = self.variables.get(&id).ok_or(Error::UnknownNode(id))?;
        if !self.graph.is_attached(id) {
            return Ok(());
        }

        debug!(node = %variable.name, "detaching");
        self.graph.deregister_extended(id);
        for parent in variable.parents.references() {
            self.graph.unbind(id, parent);
        }
        self.graph.set_attached(id, false);
        Ok(())
    }

    /// Register a detached node with its parents again.
    ///
    /// Extended parents are recomputed and the evaluator rebuilt, since the
    /// parents' closures may have changed in the meantime. On failure the
    /// node is left detached.
    pub fn attach(&mut self, id: NodeId) -> Result<()> {
        let variable = self.variables.get(&id).ok_or(Error::UnknownNode(id))?;
        if self.graph.is_attached(id) {
            return Ok(());
        }

        debug!(node = %variable.name, "attaching");
        for parent in variable.parents.references() {
            self.graph.bind(id, parent);
        }
        self.graph.set_attached(id, true);

        let affected = self.refresh_closure(id);
        let previous = self.install_evaluators(&affected);
        if let Err(err) = self.force_evaluators(&affected, false) {
            debug!(node = %id, error = %err, "attach failed, detaching again");
            self.detach(id)?;
            self.refresh_closure(id);
            self.restore_evaluators(previous);
            return Err(err);
        }
        Ok(())
    }

    /// Remove a node from the model.
    ///
    /// Fails with [`Error::NodeInUse`] while another node binds it as a
    /// parent, directly or through a container, or while it is a container
    /// member.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let variable = self.variable(id)?;

        let bound_elsewhere = self
            .variables
            .iter()
            .any(|(&other, v)| other != id && self.bound_members(v).any(|m| m == id));
        if bound_elsewhere {
            return Err(Error::NodeInUse {
                name: variable.name.clone(),
                reason: "other nodes bind it as a parent",
            });
        }
        if self.graph.containers().any(|c| c.contains(id)) {
            return Err(Error::NodeInUse {
                name: variable.name.clone(),
                reason: "it is a member of a container",
            });
        }

        debug!(node = %variable.name, "removing");
        self.discard(id);
        Ok(())
    }

    /// Bind `key` to `parent`, returning the previous reference.
    fn swap_binding(&mut self, owner: NodeId, key: &str, parent: Parent) -> Result<Parent> {
        let attached = self.graph.is_attached(owner);
        let variable = self.variables.get_mut(&owner).ok_or(Error::UnknownNode(owner))?;
        let old = variable
            .parents
            .replace(key, parent.clone())
            .ok_or_else(|| Error::UnknownParent {
                owner: variable.name.clone(),
                key: key.to_string(),
            })?;

        if attached {
            self.graph.unbind(owner, &old);
            self.graph.bind(owner, &parent);
        }
        Ok(old)
    }

    /// Recompute extended parents of `owner` and every node whose closure
    /// passes through it. Returns the affected nodes, parents first.
    fn refresh_closure(&mut self, owner: NodeId) -> Vec<NodeId> {
        let mut affected = vec![owner];
        affected.extend(self.closure_dependents(owner));

        for &id in &affected {
            if let Some(variable) = self.variables.get(&id) {
                self.graph
                    .refresh_extended_parents(id, variable.parents.references());
            }
        }
        affected
    }

    /// Nodes whose extended parents are computed through `owner`.
    ///
    /// Only deterministic nodes are collapsed by the closures, so this is
    /// empty unless `owner` is deterministic. Otherwise it is every node
    /// binding `owner`, continuing through deterministic nodes, returned in
    /// topological order. Bindings are followed rather than child
    /// registrations, so detached nodes are included.
    fn closure_dependents(&self, owner: NodeId) -> Vec<NodeId> {
        if self.graph.kind(owner) != Some(NodeKind::Deterministic) {
            return Vec::new();
        }

        let mut found = IndexSet::new();
        let mut queue = VecDeque::from([owner]);
        while let Some(id) = queue.pop_front() {
            for (&other, variable) in &self.variables {
                if found.contains(&other) || !self.bound_members(variable).any(|m| m == id) {
                    continue;
                }
                found.insert(other);
                if variable.kind() == NodeKind::Deterministic {
                    queue.push_back(other);
                }
            }
        }

        // Kahn's algorithm, counting only bindings inside the found set
        let mut pending: HashMap<NodeId, IndexSet<NodeId>> = found
            .iter()
            .map(|&id| {
                let parents = self
                    .variables
                    .get(&id)
                    .map(|v| {
                        self.bound_members(v)
                            .filter(|m| found.contains(m))
                            .collect::<IndexSet<_>>()
                    })
                    .unwrap_or_default();
                (id, parents)
            })
            .collect();
        let mut ready: VecDeque<NodeId> = found
            .iter()
            .copied()
            .filter(|id| pending.get(id).is_some_and(IndexSet::is_empty))
            .collect();
        let mut order = Vec::with_capacity(found.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            for &other in &found {
                if let Some(parents) = pending.get_mut(&other) {
                    if parents.shift_remove(&id) && parents.is_empty() {
                        ready.push_back(other);
                    }
                }
            }
        }

        order
    }

    /// Every variable `variable` binds, directly or through containers.
    fn bound_members<'a>(&'a self, variable: &'a Variable) -> impl Iterator<Item = NodeId> + 'a {
        variable
            .parents
            .references()
            .flat_map(move |parent| self.graph.members(parent))
    }

    /// Give every affected node a fresh evaluator, returning the old ones.
    fn install_evaluators(&mut self, affected: &[NodeId]) -> Vec<(NodeId, LazyFunction)> {
        let mut previous = Vec::with_capacity(affected.len());
        for &id in affected {
            let (Some(relations), Some(variable)) = (self.graph.node(id), self.variables.get_mut(&id))
            else {
                continue;
            };
            let fresh = variable.build_evaluator(id, relations.extended_parents());
            previous.push((id, std::mem::replace(&mut variable.evaluator, fresh)));
        }
        previous
    }

    fn restore_evaluators(&mut self, previous: Vec<(NodeId, LazyFunction)>) {
        for (id, evaluator) in previous {
            if let Some(variable) = self.variables.get_mut(&id) {
                variable.evaluator = evaluator;
            }
        }
    }

    /// Force every evaluator in `affected`, in order, validating
    /// log-densities. A forbidden state is only an error with `reject_zero`.
    pub(super) fn force_evaluators(&self, affected: &[NodeId], reject_zero: bool) -> Result<()> {
        for &id in affected {
            let variable = self.variable(id)?;
            let result = variable.evaluator.force_compute(self)?;
            if variable.kind().is_density_bearing() {
                self.check_logp(variable, result, reject_zero)?;
            }
        }
        Ok(())
    }
}
