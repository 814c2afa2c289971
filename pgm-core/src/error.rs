//! Error types for model construction, mutation and evaluation.

use indexmap::IndexMap;
use thiserror::Error;

use crate::graph::{ContainerId, NodeId, NodeKind};
use crate::lazy::ParentValue;
use crate::value::Value;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the model.
///
/// Everything except [`Error::ZeroProbability`] signals a modeling or
/// programming bug. A zero-probability error is the routine way a sampler
/// learns that a proposed state is forbidden, and is meant to be caught.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The log-density is at or below [`LOG_ZERO`](crate::LOG_ZERO).
    #[error("{kind} `{name}` forbids the current state ({})", describe_state(.value, .parents))]
    ZeroProbability {
        name: String,
        kind: NodeKind,
        /// The node's own value; potentials have none.
        value: Option<Value>,
        parents: IndexMap<String, ParentValue>,
    },

    /// The log-density is NaN.
    #[error("`{name}`: computed log-probability is NaN")]
    NotANumber { name: String },

    /// A computed result could not be converted to the required type.
    #[error("`{name}`: {detail}")]
    TypeConversion { name: String, detail: String },

    /// Attempted to assign the value of a deterministic node.
    #[error("deterministic `{name}`'s value cannot be set")]
    ImmutableValue { name: String },

    /// Attempted to overwrite a fully observed stochastic node.
    #[error("stochastic `{name}`'s value cannot be updated while it is observed data")]
    DataIsFixed { name: String },

    /// Log-densities are derived and can never be assigned.
    #[error("`{name}`'s log-probability cannot be set")]
    ReadOnlyLogp { name: String },

    #[error("stochastic `{name}` has no initial value and no random method to draw one")]
    MissingInitialValue { name: String },

    #[error("stochastic `{name}` does not know how to draw its value")]
    NoRandom { name: String },

    /// Binding the parent would close a cycle in the graph.
    #[error("binding `{parent}` as a parent of `{owner}` would create a cycle")]
    CyclicDependency { owner: String, parent: String },

    #[error("`{owner}` cannot bind `{key}`: {reason}")]
    InvalidParent {
        owner: String,
        key: String,
        reason: &'static str,
    },

    #[error("container `{container}` cannot hold potential `{member}`")]
    InvalidMember { container: String, member: String },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown container {0}")]
    UnknownContainer(ContainerId),

    /// Parent keys are fixed at construction.
    #[error("`{owner}` has no parent named `{key}`")]
    UnknownParent { owner: String, key: String },

    #[error("a node or container named `{0}` already exists")]
    DuplicateName(String),

    #[error("`{name}` cannot be removed: {reason}")]
    NodeInUse { name: String, reason: &'static str },

    #[error("{kind} `{name}` does not support {operation}")]
    Unsupported {
        name: String,
        kind: NodeKind,
        operation: &'static str,
    },

    #[error("`{name}`: expected an array of length {expected}, got {found}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        found: String,
    },

    /// Raised by [`Arguments`](crate::Arguments) accessors.
    #[error("argument `{key}`: {reason}")]
    Argument { key: String, reason: String },

    /// Raised by user functions that cannot produce a result.
    #[error("{0}")]
    Function(String),

    /// A relation set disagrees with the live bindings.
    #[error("inconsistent graph: {0}")]
    Inconsistent(String),
}

impl Error {
    /// Build an error from inside a user-supplied function.
    pub fn function(message: impl Into<String>) -> Self {
        Error::Function(message.into())
    }

    /// Whether this is the routine "forbidden state" signal.
    pub fn is_zero_probability(&self) -> bool {
        matches!(self, Error::ZeroProbability { .. })
    }
}

fn describe_state(value: &Option<Value>, parents: &IndexMap<String, ParentValue>) -> String {
    let parents = parents
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ");
    match value {
        Some(value) => format!("value: {}; parents: {{{}}}", value, parents),
        None => format!("parents: {{{}}}", parents),
    }
}
