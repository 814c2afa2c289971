//! Parent binding map.

use indexmap::IndexMap;

use crate::graph::Parent;

/// A node's parents, keyed by role name.
///
/// Role names are fixed when the node is built; only the references they
/// are bound to can change afterwards, and only through
/// [`Model::rebind`](crate::Model::rebind), which keeps the registry in
/// step.
#[derive(Debug, Clone, Default)]
pub struct ParentMap {
    bindings: IndexMap<String, Parent>,
}

impl ParentMap {
    pub(crate) fn new(bindings: IndexMap<String, Parent>) -> Self {
        Self { bindings }
    }

    pub fn get(&self, key: &str) -> Option<&Parent> {
        self.bindings.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parent)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// The bound references, in role order.
    pub fn references(&self) -> impl Iterator<Item = &Parent> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn as_map(&self) -> &IndexMap<String, Parent> {
        &self.bindings
    }

    /// Bind `key` to `parent`, returning the previous reference.
    ///
    /// Returns `None` and leaves the map untouched if `key` is not a role
    /// of this node.
    pub(crate) fn replace(&mut self, key: &str, parent: Parent) -> Option<Parent> {
        let slot = self.bindings.get_mut(key)?;
        Some(std::mem::replace(slot, parent))
    }
}
