//! Model
//!
//! The [`Model`] is the arena owning every node and container. It is the
//! only entry point for mutation, which lets it keep the relation registry,
//! the parent bindings and the evaluators in step.
//!
//! # Construction Sequence
//!
//! Adding a node:
//!
//! 1. Validates the name and every parent reference.
//! 2. Registers the node as a child of its parents and computes its
//!    extended parents, registering it as an extended child if it is
//!    density-bearing.
//! 3. Resolves a stochastic node's initial value, drawing it if needed.
//! 4. Builds the evaluator and forces the first computation, so a broken
//!    model fails here rather than at first read. A density-bearing node
//!    whose initial state has zero probability is rejected too.
//!
//! A failure at any step removes every trace of the node again.

mod access;
mod blanket;
mod consistency;
mod rebind;
mod trace;

pub use trace::Trace;

use std::collections::HashMap;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::graph::{Container, ContainerId, Graph, NodeId, NodeKind, Parent};
use crate::lazy::{resolve_arguments, ArgumentSource, ParentValue, Stamp};
use crate::value::Value;
use crate::variable::{
    build_evaluator, resolve_initial, Deterministic, ParentMap, Potential, Stochastic,
    StochasticState, Variable, VariableState, VALUE_KEY,
};

#[derive(Debug, Clone, Copy)]
enum Named {
    Node(NodeId),
    Container(ContainerId),
}

/// A probabilistic model: nodes, containers and their relations.
pub struct Model {
    config: ModelConfig,
    graph: Graph,
    variables: IndexMap<NodeId, Variable>,
    names: HashMap<String, Named>,
}

/// Builder fields shared by all node kinds.
struct NodeParts {
    name: String,
    doc: Option<String>,
    parents: IndexMap<String, Parent>,
    trace: bool,
    cache_depth: Option<usize>,
}

impl Model {
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    pub fn with_config(config: ModelConfig) -> Self {
        Self {
            config,
            graph: Graph::new(),
            variables: IndexMap::new(),
            names: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The relation registry.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    pub fn add_stochastic(&mut self, spec: Stochastic) -> Result<NodeId> {
        let Stochastic {
            name,
            doc,
            parents,
            logp,
            random,
            initial,
            dtype,
            observed,
            trace,
            cache_depth,
        } = spec;

        if parents.contains_key(VALUE_KEY) {
            return Err(Error::InvalidParent {
                owner: name,
                key: VALUE_KEY.to_string(),
                reason: "the key is reserved for the node's own value",
            });
        }

        let parts = NodeParts {
            name,
            doc,
            parents,
            trace,
            cache_depth,
        };
        self.add_node(parts, NodeKind::Stochastic, |model, name, parents| {
            let draw = || {
                random.as_ref().map(|random| {
                    let arguments = resolve_arguments(model, parents)?;
                    random(&arguments)
                })
            };
            let (value, missing) = resolve_initial(name, initial, dtype, draw)?;
            Ok(VariableState::Stochastic(StochasticState::new(
                value, missing, logp, random, dtype, observed,
            )))
        })
    }

    pub fn add_deterministic(&mut self, spec: Deterministic) -> Result<NodeId> {
        let Deterministic {
            name,
            doc,
            parents,
            eval,
            trace,
            cache_depth,
        } = spec;

        let parts = NodeParts {
            name,
            doc,
            parents,
            trace,
            cache_depth,
        };
        self.add_node(parts, NodeKind::Deterministic, |_, _, _| {
            Ok(VariableState::Deterministic { eval })
        })
    }

    pub fn add_potential(&mut self, spec: Potential) -> Result<NodeId> {
        let Potential {
            name,
            doc,
            parents,
            logp,
            cache_depth,
        } = spec;

        let parts = NodeParts {
            name,
            doc,
            parents,
            trace: false,
            cache_depth,
        };
        self.add_node(parts, NodeKind::Potential, |_, _, _| {
            Ok(VariableState::Potential { logp })
        })
    }

    fn add_node<F>(&mut self, parts: NodeParts, kind: NodeKind, make_state: F) -> Result<NodeId>
    where
        F: FnOnce(&Model, &str, &IndexMap<String, Parent>) -> Result<VariableState>,
    {
        let NodeParts {
            name,
            doc,
            parents,
            trace,
            cache_depth,
        } = parts;

        if self.names.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }
        for (key, parent) in &parents {
            // A new node has no dependents yet, so it cannot close a cycle
            self.validate_parent(None, &name, key, parent)?;
        }

        let id = NodeId::new();
        self.graph.insert_node(id, kind);
        for parent in parents.values() {
            self.graph.bind(id, parent);
        }
        self.graph.refresh_extended_parents(id, parents.values());

        let state = match make_state(&*self, &name, &parents) {
            Ok(state) => state,
            Err(err) => {
                self.unlink(id, parents.values());
                return Err(err);
            }
        };

        let parents = ParentMap::new(parents);
        let cache_depth = cache_depth.unwrap_or(self.config.default_cache_depth);
        let empty = IndexSet::new();
        let extended = self
            .graph
            .node(id)
            .map_or(&empty, |relations| relations.extended_parents());
        let evaluator = build_evaluator(id, &parents, &state, extended, cache_depth);

        self.variables.insert(
            id,
            Variable {
                name: name.clone(),
                doc,
                parents,
                evaluator,
                cache_depth,
                trace,
                state,
            },
        );
        self.names.insert(name.clone(), Named::Node(id));

        if let Err(err) = self.force_evaluators(&[id], true) {
            debug!(node = %name, error = %err, "construction failed, rolling back");
            self.discard(id);
            return Err(err);
        }

        debug!(node = %name, %kind, "node added");
        Ok(id)
    }

    /// Group nodes under a name, so they can be bound as one parent.
    ///
    /// Potentials carry no value and cannot be members.
    pub fn add_container<I>(&mut self, name: impl Into<String>, members: I) -> Result<ContainerId>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }

        let mut kinds = IndexMap::new();
        for member in members {
            let variable = self.variable(member)?;
            if variable.kind() == NodeKind::Potential {
                return Err(Error::InvalidMember {
                    container: name,
                    member: variable.name.clone(),
                });
            }
            kinds.insert(member, variable.kind());
        }

        let id = ContainerId::new();
        debug!(container = %name, members = kinds.len(), "container added");
        self.graph.insert_container(Container::new(id, name.clone(), kinds));
        self.names.insert(name, Named::Container(id));
        Ok(id)
    }

    pub fn container(&self, id: ContainerId) -> Result<&Container> {
        self.graph.container(id).ok_or(Error::UnknownContainer(id))
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        match self.names.get(name) {
            Some(Named::Node(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn lookup_container(&self, name: &str) -> Option<ContainerId> {
        match self.names.get(name) {
            Some(Named::Container(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.variables.contains_key(&id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.variables.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn name(&self, id: NodeId) -> Result<&str> {
        Ok(&self.variable(id)?.name)
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.variable(id)?.kind())
    }

    pub fn doc(&self, id: NodeId) -> Result<Option<&str>> {
        Ok(self.variable(id)?.doc.as_deref())
    }

    pub fn parents(&self, id: NodeId) -> Result<&ParentMap> {
        Ok(&self.variable(id)?.parents)
    }

    /// Nodes binding `id` as a parent, directly or through a container.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.variable(id)?;
        Ok(self
            .graph
            .node(id)
            .map(|r| r.children().collect())
            .unwrap_or_default())
    }

    /// Nearest stochastic ancestors, deterministic nodes collapsed.
    pub fn extended_parents(&self, id: NodeId) -> Result<&IndexSet<NodeId>> {
        self.variable(id)?;
        self.graph
            .node(id)
            .map(|r| r.extended_parents())
            .ok_or(Error::UnknownNode(id))
    }

    /// Nearest density-bearing descendants, deterministic nodes collapsed.
    /// Always empty for deterministic nodes.
    pub fn extended_children(&self, id: NodeId) -> Result<&IndexSet<NodeId>> {
        self.variable(id)?;
        self.graph
            .node(id)
            .map(|r| r.extended_children())
            .ok_or(Error::UnknownNode(id))
    }

    pub fn is_attached(&self, id: NodeId) -> Result<bool> {
        self.variable(id)?;
        Ok(self.graph.is_attached(id))
    }

    /// Version stamp of a stochastic node's current value.
    pub fn stamp(&self, id: NodeId) -> Result<Stamp> {
        let variable = self.variable(id)?;
        variable
            .stochastic()
            .map(StochasticState::stamp)
            .ok_or(Error::Unsupported {
                name: variable.name.clone(),
                kind: variable.kind(),
                operation: "version stamps",
            })
    }

    /// Number of results cached by a node's evaluator.
    pub fn cached_results(&self, id: NodeId) -> Result<usize> {
        Ok(self.variable(id)?.evaluator.cached_len())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    pub(crate) fn variable(&self, id: NodeId) -> Result<&Variable> {
        self.variables.get(&id).ok_or(Error::UnknownNode(id))
    }

    /// Check that `parent` may be bound under `key` of a node named
    /// `owner_name`. `owner` is `None` for a node still being built.
    fn validate_parent(
        &self,
        owner: Option<NodeId>,
        owner_name: &str,
        key: &str,
        parent: &Parent,
    ) -> Result<()> {
        match parent {
            Parent::Node(id) => {
                let variable = self.variable(*id)?;
                if variable.kind() == NodeKind::Potential {
                    return Err(Error::InvalidParent {
                        owner: owner_name.to_string(),
                        key: key.to_string(),
                        reason: "potentials carry no value",
                    });
                }
                if let Some(owner) = owner {
                    if self.depends_on(*id, owner) {
                        return Err(Error::CyclicDependency {
                            owner: owner_name.to_string(),
                            parent: variable.name.clone(),
                        });
                    }
                }
            }
            Parent::Container(id) => {
                let container = self.container(*id)?;
                if let Some(owner) = owner {
                    if container.variables().any(|member| self.depends_on(member, owner)) {
                        return Err(Error::CyclicDependency {
                            owner: owner_name.to_string(),
                            parent: container.name().to_string(),
                        });
                    }
                }
            }
            Parent::Constant(_) => {}
        }
        Ok(())
    }

    /// Whether `start` is `target` or has `target` among its ancestors.
    ///
    /// Walks parent bindings rather than child registrations, so detached
    /// nodes are seen too.
    fn depends_on(&self, start: NodeId, target: NodeId) -> bool {
        let mut visited = std::collections::HashSet::new();
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(variable) = self.variables.get(&id) {
                for parent in variable.parents.references() {
                    stack.extend(self.graph.members(parent));
                }
            }
        }
        false
    }

    /// Undo the registry side of a node's construction.
    fn unlink<'a, I>(&mut self, id: NodeId, parents: I)
    where
        I: IntoIterator<Item = &'a Parent>,
    {
        self.graph.deregister_extended(id);
        for parent in parents {
            self.graph.unbind(id, parent);
        }
        self.graph.remove_node(id);
    }

    /// Remove a node and every registration it holds.
    fn discard(&mut self, id: NodeId) {
        if let Some(variable) = self.variables.shift_remove(&id) {
            self.names.remove(&variable.name);
            if self.graph.is_attached(id) {
                self.unlink(id, variable.parents.references());
            } else {
                self.graph.remove_node(id);
            }
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgumentSource for Model {
    fn stamp(&self, id: NodeId) -> Result<Stamp> {
        Model::stamp(self, id)
    }

    fn resolve(&self, parent: &Parent) -> Result<ParentValue> {
        match parent {
            Parent::Node(id) => Ok(ParentValue::Single(self.value(*id)?)),
            Parent::Container(id) => {
                let values = self
                    .container(*id)?
                    .variables()
                    .map(|member| self.value(member))
                    .collect::<Result<Vec<Value>>>()?;
                Ok(ParentValue::Group(values))
            }
            Parent::Constant(value) => Ok(ParentValue::Single(value.clone())),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<_> = self
            .variables
            .iter()
            .map(|(id, v)| (*id, v.kind(), v.name.as_str()))
            .collect();
        f.debug_struct("Model")
            .field("config", &self.config)
            .field("nodes", &nodes)
            .field("containers", &self.graph.containers().count())
            .finish()
    }
}
