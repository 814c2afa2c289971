//! Value and log-density reads and writes.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::graph::{NodeId, NodeKind};
use crate::lazy::resolve_arguments;
use crate::value::{Value, LOG_ZERO};
use crate::variable::{Variable, VariableState};

use super::Model;

impl Model {
    /// The current value of a stochastic or deterministic node.
    ///
    /// A deterministic value is recomputed only if one of its ultimate
    /// arguments changed since it was last computed.
    pub fn value(&self, id: NodeId) -> Result<Value> {
        let variable = self.variable(id)?;
        match &variable.state {
            VariableState::Stochastic(state) => Ok(state.value().clone()),
            VariableState::Deterministic { .. } => variable.evaluator.get(self),
            VariableState::Potential { .. } => Err(unsupported(variable, "values")),
        }
    }

    /// Assign a stochastic node's value.
    ///
    /// Observed nodes only take the entries of their missing subset from
    /// `value`. The previous value becomes the last value; a rejected write
    /// changes nothing.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<Value>) -> Result<()> {
        let variable = self.variables.get_mut(&id).ok_or(Error::UnknownNode(id))?;
        let name = &variable.name;
        match &mut variable.state {
            VariableState::Stochastic(state) => state.assign(name, value.into()),
            VariableState::Deterministic { .. } => Err(Error::ImmutableValue { name: name.clone() }),
            VariableState::Potential { .. } => Err(Error::Unsupported {
                name: name.clone(),
                kind: NodeKind::Potential,
                operation: "values",
            }),
        }
    }

    /// The value before the most recent assignment.
    pub fn last_value(&self, id: NodeId) -> Result<Option<Value>> {
        let variable = self.variable(id)?;
        variable
            .stochastic()
            .map(|state| state.last_value().cloned())
            .ok_or_else(|| unsupported(variable, "last values"))
    }

    /// Restore the last value, bypassing coercion and observed-data checks.
    ///
    /// The restored value keeps its original stamp, so evaluators computed
    /// from it hit their caches again. Does nothing if the node was never
    /// assigned.
    pub fn revert(&mut self, id: NodeId) -> Result<()> {
        let variable = self.variables.get_mut(&id).ok_or(Error::UnknownNode(id))?;
        let kind = variable.kind();
        match &mut variable.state {
            VariableState::Stochastic(state) => {
                if state.revert() {
                    trace!(node = %variable.name, "value reverted");
                }
                Ok(())
            }
            _ => Err(Error::Unsupported {
                name: variable.name.clone(),
                kind,
                operation: "revert",
            }),
        }
    }

    /// Draw a new value from the node's random function and assign it.
    ///
    /// Returns the draw itself. On observed data with a missing subset only
    /// the missing entries of the draw are written.
    pub fn random(&mut self, id: NodeId) -> Result<Value> {
        let variable = self.variable(id)?;
        let state = variable
            .stochastic()
            .ok_or_else(|| unsupported(variable, "random draws"))?;
        let random = state.random.clone().ok_or_else(|| Error::NoRandom {
            name: variable.name.clone(),
        })?;

        let arguments = resolve_arguments(self, variable.parents.as_map())?;
        let drawn = random(&arguments)?;
        self.set_value(id, drawn.clone())?;
        Ok(drawn)
    }

    /// Entries of an observed array that remain free.
    pub fn missing(&self, id: NodeId) -> Result<&[usize]> {
        let variable = self.variable(id)?;
        variable
            .stochastic()
            .map(|state| state.missing())
            .ok_or_else(|| unsupported(variable, "missing entries"))
    }

    pub fn is_observed(&self, id: NodeId) -> Result<bool> {
        let variable = self.variable(id)?;
        Ok(variable.stochastic().is_some_and(|state| state.is_observed()))
    }

    /// The log-density of a stochastic node or potential.
    ///
    /// Fails with [`Error::ZeroProbability`] when the current state is
    /// forbidden, which samplers treat as a rejection.
    pub fn logp(&self, id: NodeId) -> Result<f64> {
        let variable = self.variable(id)?;
        if !variable.kind().is_density_bearing() {
            return Err(unsupported(variable, "log-probabilities"));
        }
        let raw = variable.evaluator.get(self)?;
        self.check_logp(variable, raw, true)
    }

    /// Log-densities are derived from values and can never be assigned.
    pub fn set_logp(&mut self, id: NodeId, _logp: f64) -> Result<()> {
        let variable = self.variable(id)?;
        Err(Error::ReadOnlyLogp {
            name: variable.name.clone(),
        })
    }

    /// Sum of the log-densities of `ids`, stopping at the first error.
    pub fn joint_logp<I>(&self, ids: I) -> Result<f64>
    where
        I: IntoIterator<Item = NodeId>,
    {
        ids.into_iter().map(|id| self.logp(id)).sum()
    }

    /// Convert a computed log-density to `f64` and validate it.
    ///
    /// `reject_zero` is off at rebind and attach time, where a forbidden
    /// state is still a valid configuration.
    pub(super) fn check_logp(&self, variable: &Variable, raw: Value, reject_zero: bool) -> Result<f64> {
        let logp = raw.as_f64().ok_or_else(|| Error::TypeConversion {
            name: variable.name.clone(),
            detail: format!("log-probability {} is not a real number", raw),
        })?;

        if logp.is_nan() {
            return Err(Error::NotANumber {
                name: variable.name.clone(),
            });
        }

        if reject_zero && logp <= LOG_ZERO {
            let parents = match resolve_arguments(self, variable.parents.as_map()) {
                Ok(arguments) => arguments.into_inner(),
                Err(err) => {
                    debug!(
                        node = %variable.name,
                        error = %err,
                        "parent values unavailable for zero-probability report"
                    );
                    Default::default()
                }
            };
            return Err(Error::ZeroProbability {
                name: variable.name.clone(),
                kind: variable.kind(),
                value: variable.stochastic().map(|state| state.value().clone()),
                parents,
            });
        }

        Ok(logp)
    }
}

fn unsupported(variable: &Variable, operation: &'static str) -> Error {
    Error::Unsupported {
        name: variable.name.clone(),
        kind: variable.kind(),
        operation,
    }
}
