//! Stochastic Variables
//!
//! A stochastic node owns its value. Its log-density is a function of that
//! value and its parents' values.
//!
//! # Value Lifecycle
//!
//! 1. At construction the value comes from the builder, from a random draw
//!    if none was given, or from both when the given array has unknown
//!    entries: those entries (the *missing subset*) are drawn.
//!
//! 2. Every assignment saves the current value and stamp as the last value
//!    and gives the new value a fresh stamp.
//!
//! 3. A revert restores the last value together with its stamp, so cached
//!    log-densities of the restored state are reused.
//!
//! Observed nodes reject assignments, except to their missing subset.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{Error, Result};
use crate::graph::Parent;
use crate::lazy::{Arguments, ComputeFn, Stamp};
use crate::value::{Dtype, Value};

/// Indices of the entries of an observed array that remain free.
pub type MissingIndices = SmallVec<[usize; 8]>;

/// How the builder specified the initial value.
#[derive(Debug, Clone)]
pub(crate) enum InitialValue {
    Known(Value),
    /// A float array with unknown entries.
    Partial(Vec<Option<f64>>),
}

/// Builder for a stochastic node.
///
/// # Example
///
/// ```rust,ignore
/// let x = model.add_stochastic(
///     Stochastic::new("x", normal_logp)
///         .parent("mu", mu)
///         .parent("tau", 1.0)
///         .random(normal_draw)
///         .value(0.5),
/// )?;
/// ```
pub struct Stochastic {
    pub(crate) name: String,
    pub(crate) doc: Option<String>,
    pub(crate) parents: IndexMap<String, Parent>,
    pub(crate) logp: ComputeFn,
    pub(crate) random: Option<ComputeFn>,
    pub(crate) initial: Option<InitialValue>,
    pub(crate) dtype: Option<Dtype>,
    pub(crate) observed: bool,
    pub(crate) trace: bool,
    pub(crate) cache_depth: Option<usize>,
}

impl Stochastic {
    /// Start a stochastic node whose log-density is computed by `logp`.
    ///
    /// `logp` sees every parent plus the node's own value under `"value"`.
    pub fn new<F>(name: impl Into<String>, logp: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            doc: None,
            parents: IndexMap::new(),
            logp: Arc::new(logp),
            random: None,
            initial: None,
            dtype: None,
            observed: false,
            trace: true,
            cache_depth: None,
        }
    }

    /// Bind a parent role.
    pub fn parent(mut self, key: impl Into<String>, parent: impl Into<Parent>) -> Self {
        self.parents.insert(key.into(), parent.into());
        self
    }

    /// A function drawing a value given the parents' values.
    pub fn random<F>(mut self, random: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        self.random = Some(Arc::new(random));
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(InitialValue::Known(value.into()));
        self
    }

    /// An array value whose `None` entries are unknown.
    ///
    /// The unknown entries are drawn at construction and stay writable even
    /// when the node is observed.
    pub fn partial_value(mut self, entries: Vec<Option<f64>>) -> Self {
        self.initial = Some(InitialValue::Partial(entries));
        self
    }

    /// Coerce every assigned value to `dtype`.
    pub fn dtype(mut self, dtype: Dtype) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Mark the value as observed data.
    pub fn observed(mut self) -> Self {
        self.observed = true;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Whether the value appears in [`Model::trace_values`](crate::Model::trace_values).
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn cache_depth(mut self, depth: usize) -> Self {
        self.cache_depth = Some(depth);
        self
    }
}

/// Runtime state of a stochastic node.
pub(crate) struct StochasticState {
    value: Value,
    stamp: Stamp,
    last: Option<(Value, Stamp)>,
    pub(crate) logp: ComputeFn,
    pub(crate) random: Option<ComputeFn>,
    dtype: Option<Dtype>,
    observed: bool,
    missing: MissingIndices,
}

impl StochasticState {
    pub(crate) fn new(
        value: Value,
        missing: MissingIndices,
        logp: ComputeFn,
        random: Option<ComputeFn>,
        dtype: Option<Dtype>,
        observed: bool,
    ) -> Self {
        Self {
            value,
            stamp: Stamp::next(),
            last: None,
            logp,
            random,
            dtype,
            observed,
            missing,
        }
    }

    pub(crate) fn value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn stamp(&self) -> Stamp {
        self.stamp
    }

    pub(crate) fn last_value(&self) -> Option<&Value> {
        self.last.as_ref().map(|(value, _)| value)
    }

    pub(crate) fn is_observed(&self) -> bool {
        self.observed
    }

    pub(crate) fn missing(&self) -> &[usize] {
        &self.missing
    }

    /// Assign a new value through the checked write path.
    ///
    /// Nothing changes if the write is rejected.
    pub(crate) fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        let value = if self.observed {
            if self.missing.is_empty() {
                return Err(Error::DataIsFixed {
                    name: name.to_string(),
                });
            }
            merge_missing(name, &self.value, &self.missing, &value)?
        } else {
            value
        };
        let value = coerce(name, value, self.dtype)?;

        trace!(node = name, %value, "value set");
        let previous = std::mem::replace(&mut self.value, value);
        self.last = Some((previous, self.stamp));
        self.stamp = Stamp::next();
        Ok(())
    }

    /// Restore the last value and its stamp, bypassing every check.
    ///
    /// Returns `false` if there is nothing to restore.
    pub(crate) fn revert(&mut self) -> bool {
        match &self.last {
            Some((value, stamp)) => {
                self.value = value.clone();
                self.stamp = *stamp;
                true
            }
            None => false,
        }
    }
}

/// Work out a new node's value and missing subset.
///
/// `draw` is only invoked when a random draw is needed.
pub(crate) fn resolve_initial<D>(
    name: &str,
    initial: Option<InitialValue>,
    dtype: Option<Dtype>,
    draw: D,
) -> Result<(Value, MissingIndices)>
where
    D: Fn() -> Option<Result<Value>>,
{
    let missing_initial = || Error::MissingInitialValue {
        name: name.to_string(),
    };

    let (value, missing) = match initial {
        Some(InitialValue::Known(value)) => (value, MissingIndices::new()),
        Some(InitialValue::Partial(entries)) => {
            let missing: MissingIndices = entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.is_none())
                .map(|(i, _)| i)
                .collect();
            let placeholder: Vec<f64> = entries.iter().map(|e| e.unwrap_or(f64::NAN)).collect();
            let mut value = Value::from(placeholder);

            if !missing.is_empty() {
                let drawn = draw().ok_or_else(missing_initial)??;
                value = merge_missing(name, &value, &missing, &drawn)?;
            }
            (value, missing)
        }
        None => {
            let drawn = draw().ok_or_else(missing_initial)??;
            (drawn, MissingIndices::new())
        }
    };

    Ok((coerce(name, value, dtype)?, missing))
}

fn merge_missing(name: &str, current: &Value, missing: &[usize], new: &Value) -> Result<Value> {
    if !current.same_shape(new) {
        return Err(Error::ShapeMismatch {
            name: name.to_string(),
            expected: current.len().unwrap_or(0),
            found: match new.len() {
                Some(len) => format!("an array of length {} ({})", len, new.dtype()),
                None => format!("the scalar {}", new),
            },
        });
    }
    current
        .scatter(missing, new)
        .ok_or_else(|| Error::TypeConversion {
            name: name.to_string(),
            detail: format!(
                "missing entries of {} cannot be converted to {}",
                new,
                current.dtype()
            ),
        })
}

fn coerce(name: &str, value: Value, dtype: Option<Dtype>) -> Result<Value> {
    match dtype {
        Some(dtype) if value.dtype() != dtype => {
            value.coerce(dtype).ok_or_else(|| Error::TypeConversion {
                name: name.to_string(),
                detail: format!("value {} cannot be converted to {}", value, dtype),
            })
        }
        _ => Ok(value),
    }
}
