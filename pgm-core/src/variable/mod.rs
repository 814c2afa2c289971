//! Variables
//!
//! Builders for the three node kinds, and the per-node record the model
//! keeps for each of them.
//!
//! # Node Kinds
//!
//! | Kind            | Value    | Log-density | Can be a parent |
//! |-----------------|----------|-------------|-----------------|
//! | `Stochastic`    | owned    | yes         | yes             |
//! | `Deterministic` | computed | no          | yes             |
//! | `Potential`     | none     | yes         | no              |
//!
//! Every node owns exactly one [`LazyFunction`]: a deterministic node's
//! value, or a density-bearing node's log-density. It is rebuilt whenever
//! the node's parents or extended parents change.

mod deterministic;
mod parents;
mod potential;
mod stochastic;

pub use deterministic::Deterministic;
pub use parents::ParentMap;
pub use potential::Potential;
pub use stochastic::{MissingIndices, Stochastic};

pub(crate) use stochastic::{resolve_initial, StochasticState};

use indexmap::{IndexMap, IndexSet};

use crate::graph::{NodeId, NodeKind, Parent};
use crate::lazy::{ComputeFn, LazyFunction};

/// The argument key under which a stochastic node's log-density sees its
/// own value.
pub const VALUE_KEY: &str = "value";

/// Kind-specific state of a node.
pub(crate) enum VariableState {
    Stochastic(StochasticState),
    Deterministic { eval: ComputeFn },
    Potential { logp: ComputeFn },
}

impl VariableState {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            VariableState::Stochastic(_) => NodeKind::Stochastic,
            VariableState::Deterministic { .. } => NodeKind::Deterministic,
            VariableState::Potential { .. } => NodeKind::Potential,
        }
    }
}

/// A node as owned by the model.
pub(crate) struct Variable {
    pub(crate) name: String,
    pub(crate) doc: Option<String>,
    pub(crate) parents: ParentMap,
    pub(crate) evaluator: LazyFunction,
    pub(crate) cache_depth: usize,
    pub(crate) trace: bool,
    pub(crate) state: VariableState,
}

impl Variable {
    pub(crate) fn kind(&self) -> NodeKind {
        self.state.kind()
    }

    pub(crate) fn stochastic(&self) -> Option<&StochasticState> {
        match &self.state {
            VariableState::Stochastic(state) => Some(state),
            _ => None,
        }
    }

    /// A fresh evaluator for the current bindings.
    pub(crate) fn build_evaluator(&self, id: NodeId, extended_parents: &IndexSet<NodeId>) -> LazyFunction {
        build_evaluator(
            id,
            &self.parents,
            &self.state,
            extended_parents,
            self.cache_depth,
        )
    }
}

/// Build the evaluator of node `id`.
///
/// A stochastic node's log-density additionally receives the node itself
/// under [`VALUE_KEY`] and counts it among its ultimate arguments, since the
/// result depends on its own value.
pub(crate) fn build_evaluator(
    id: NodeId,
    parents: &ParentMap,
    state: &VariableState,
    extended_parents: &IndexSet<NodeId>,
    cache_depth: usize,
) -> LazyFunction {
    let ultimate = extended_parents.iter().copied();
    match state {
        VariableState::Stochastic(stochastic) => {
            let mut arguments: IndexMap<String, Parent> = parents.as_map().clone();
            arguments.insert(VALUE_KEY.to_string(), Parent::Node(id));
            LazyFunction::new(
                stochastic.logp.clone(),
                arguments,
                ultimate.chain(std::iter::once(id)),
                cache_depth,
            )
        }
        VariableState::Deterministic { eval } => {
            LazyFunction::new(eval.clone(), parents.as_map().clone(), ultimate, cache_depth)
        }
        VariableState::Potential { logp } => {
            LazyFunction::new(logp.clone(), parents.as_map().clone(), ultimate, cache_depth)
        }
    }
}
