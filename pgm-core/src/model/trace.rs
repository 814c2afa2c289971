//! Value snapshots.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::Value;

use super::Model;

/// Current values of every traced node, keyed by name.
///
/// Samplers take one per iteration; it serializes with serde.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    values: IndexMap<String, Value>,
}

impl Trace {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Model {
    /// Snapshot the values of all traced stochastic and deterministic
    /// nodes, in insertion order.
    pub fn trace_values(&self) -> Result<Trace> {
        let mut values = IndexMap::new();
        for (&id, variable) in &self.variables {
            if variable.trace && variable.kind().is_value_bearing() {
                values.insert(variable.name.clone(), self.value(id)?);
            }
        }
        Ok(Trace { values })
    }
}
