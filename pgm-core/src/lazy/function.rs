//! Lazy Function
//!
//! A `LazyFunction` memoizes one computation (a deterministic node's value
//! or a density-bearing node's log-density) as a function of its parents.
//!
//! # How Caching Works
//!
//! 1. Each evaluator knows its *ultimate arguments*: the stochastic nodes
//!    whose values determine its result, found by collapsing deterministic
//!    parents.
//!
//! 2. On access, the evaluator reads the current [`Stamp`] of every ultimate
//!    argument and looks for a cached entry computed from exactly those
//!    stamps.
//!
//! 3. On a hit, the cached result is returned without resolving any
//!    arguments. On a miss, the arguments are resolved, the function runs,
//!    and the result is pushed to the front of the cache, evicting the
//!    oldest entry beyond the configured depth.
//!
//! Parents bound to constants never change while an evaluator is alive: a
//! rebind always builds a new evaluator.
//!
//! # Thread Safety
//!
//! Reads go through `&self` and fill the cache behind a `parking_lot`
//! lock. The lock is never held while the user function runs, so an
//! evaluator reading another node's evaluator cannot deadlock.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

use super::arguments::{Arguments, ParentValue};
use super::stamp::Stamp;
use crate::error::Result;
use crate::graph::{NodeId, Parent};
use crate::value::Value;

/// A user function computing a value or log-density from arguments.
pub type ComputeFn = Arc<dyn Fn(&Arguments) -> Result<Value> + Send + Sync>;

/// Where an evaluator reads argument values and version stamps from.
pub trait ArgumentSource {
    /// The stamp of a stochastic node's current value.
    fn stamp(&self, id: NodeId) -> Result<Stamp>;

    /// The current value behind a parent reference.
    fn resolve(&self, parent: &Parent) -> Result<ParentValue>;
}

/// Resolve every argument of a binding map.
pub fn resolve_arguments<S>(source: &S, arguments: &IndexMap<String, Parent>) -> Result<Arguments>
where
    S: ArgumentSource + ?Sized,
{
    let mut values = IndexMap::with_capacity(arguments.len());
    for (key, parent) in arguments {
        values.insert(key.clone(), source.resolve(parent)?);
    }
    Ok(Arguments::new(values))
}

type StampKey = SmallVec<[Stamp; 8]>;

struct CacheEntry {
    stamps: StampKey,
    result: Value,
}

/// A memoized computation over a fixed set of arguments.
pub struct LazyFunction {
    /// The computation function.
    fun: ComputeFn,

    /// Role name to parent reference, as passed to the function.
    arguments: IndexMap<String, Parent>,

    /// Nodes whose stamps decide cache validity.
    ultimate: Vec<NodeId>,

    /// Maximum number of cached results.
    cache_depth: usize,

    /// Most recent result first.
    cache: RwLock<VecDeque<CacheEntry>>,
}

impl LazyFunction {
    pub fn new<I>(
        fun: ComputeFn,
        arguments: IndexMap<String, Parent>,
        ultimate: I,
        cache_depth: usize,
    ) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        Self {
            fun,
            arguments,
            ultimate: ultimate.into_iter().collect(),
            cache_depth,
            cache: RwLock::new(VecDeque::with_capacity(cache_depth)),
        }
    }

    /// Get the current result, recomputing only if no cached entry matches
    /// the current stamps of the ultimate arguments.
    pub fn get<S>(&self, source: &S) -> Result<Value>
    where
        S: ArgumentSource + ?Sized,
    {
        let stamps = self.current_stamps(source)?;

        let hit = self
            .cache
            .read()
            .iter()
            .find(|entry| entry.stamps == stamps)
            .map(|entry| entry.result.clone());
        if let Some(result) = hit {
            trace!("lazy function cache hit");
            return Ok(result);
        }

        trace!("lazy function cache miss");
        self.compute(source, stamps)
    }

    /// Recompute unconditionally and cache the result.
    pub fn force_compute<S>(&self, source: &S) -> Result<Value>
    where
        S: ArgumentSource + ?Sized,
    {
        let stamps = self.current_stamps(source)?;
        self.compute(source, stamps)
    }

    pub fn arguments(&self) -> &IndexMap<String, Parent> {
        &self.arguments
    }

    pub fn ultimate_arguments(&self) -> &[NodeId] {
        &self.ultimate
    }

    pub fn cache_depth(&self) -> usize {
        self.cache_depth
    }

    /// Number of results currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    fn current_stamps<S>(&self, source: &S) -> Result<StampKey>
    where
        S: ArgumentSource + ?Sized,
    {
        self.ultimate.iter().map(|id| source.stamp(*id)).collect()
    }

    fn compute<S>(&self, source: &S, stamps: StampKey) -> Result<Value>
    where
        S: ArgumentSource + ?Sized,
    {
        let arguments = resolve_arguments(source, &self.arguments)?;
        let result = (self.fun)(&arguments)?;

        if self.cache_depth > 0 {
            let mut cache = self.cache.write();
            cache.retain(|entry| entry.stamps != stamps);
            cache.push_front(CacheEntry {
                stamps,
                result: result.clone(),
            });
            cache.truncate(self.cache_depth);
        }

        Ok(result)
    }
}

impl fmt::Debug for LazyFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFunction")
            .field("arguments", &self.arguments)
            .field("ultimate", &self.ultimate)
            .field("cache_depth", &self.cache_depth)
            .field("cached", &self.cached_len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Default)]
    struct MockSource {
        nodes: HashMap<NodeId, (Stamp, Value)>,
    }

    impl MockSource {
        fn set(&mut self, id: NodeId, value: f64) -> Stamp {
            let stamp = Stamp::next();
            self.nodes.insert(id, (stamp, Value::from(value)));
            stamp
        }

        fn restore(&mut self, id: NodeId, stamp: Stamp, value: f64) {
            self.nodes.insert(id, (stamp, Value::from(value)));
        }
    }

    impl ArgumentSource for MockSource {
        fn stamp(&self, id: NodeId) -> Result<Stamp> {
            self.nodes
                .get(&id)
                .map(|(stamp, _)| *stamp)
                .ok_or(Error::UnknownNode(id))
        }

        fn resolve(&self, parent: &Parent) -> Result<ParentValue> {
            match parent {
                Parent::Node(id) => self
                    .nodes
                    .get(id)
                    .map(|(_, value)| ParentValue::Single(value.clone()))
                    .ok_or(Error::UnknownNode(*id)),
                Parent::Constant(value) => Ok(ParentValue::Single(value.clone())),
                Parent::Container(id) => Err(Error::UnknownContainer(*id)),
            }
        }
    }

    fn doubling(x: NodeId, depth: usize, calls: Arc<AtomicI32>) -> LazyFunction {
        let mut arguments = IndexMap::new();
        arguments.insert("x".to_string(), Parent::Node(x));
        arguments.insert("k".to_string(), Parent::constant(2.0));

        let fun: ComputeFn = Arc::new(move |args: &Arguments| -> Result<Value> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from(args.f64("x")? * args.f64("k")?))
        });
        LazyFunction::new(fun, arguments, [x], depth)
    }

    #[test]
    fn lazy_function_caches_while_stamps_match() {
        let x = NodeId::new();
        let mut source = MockSource::default();
        source.set(x, 1.0);

        let calls = Arc::new(AtomicI32::new(0));
        let lazy = doubling(x, 2, calls.clone());

        // First access computes
        assert_eq!(lazy.get(&source).unwrap(), Value::from(2.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Subsequent accesses use cache
        assert_eq!(lazy.get(&source).unwrap(), Value::from(2.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A new stamp invalidates
        source.set(x, 3.0);
        assert_eq!(lazy.get(&source).unwrap(), Value::from(6.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn restored_stamp_hits_older_entry() {
        let x = NodeId::new();
        let mut source = MockSource::default();
        let first = source.set(x, 1.0);

        let calls = Arc::new(AtomicI32::new(0));
        let lazy = doubling(x, 2, calls.clone());
        lazy.get(&source).unwrap();

        // Propose, evaluate, then revert
        source.set(x, 5.0);
        lazy.get(&source).unwrap();
        source.restore(x, first, 1.0);

        assert_eq!(lazy.get(&source).unwrap(), Value::from(2.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(lazy.cached_len(), 2);
    }

    #[test]
    fn cache_depth_bounds_entries() {
        let x = NodeId::new();
        let mut source = MockSource::default();
        let first = source.set(x, 1.0);

        let calls = Arc::new(AtomicI32::new(0));
        let lazy = doubling(x, 1, calls.clone());
        lazy.get(&source).unwrap();

        source.set(x, 2.0);
        lazy.get(&source).unwrap();
        assert_eq!(lazy.cached_len(), 1);

        // The first entry was evicted
        source.restore(x, first, 1.0);
        lazy.get(&source).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn force_compute_always_runs() {
        let x = NodeId::new();
        let mut source = MockSource::default();
        source.set(x, 1.0);

        let calls = Arc::new(AtomicI32::new(0));
        let lazy = doubling(x, 2, calls.clone());

        lazy.force_compute(&source).unwrap();
        lazy.force_compute(&source).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Re-forcing the same stamps does not duplicate the entry
        assert_eq!(lazy.cached_len(), 1);
    }

    #[test]
    fn zero_depth_never_caches() {
        let x = NodeId::new();
        let mut source = MockSource::default();
        source.set(x, 1.0);

        let calls = Arc::new(AtomicI32::new(0));
        let lazy = doubling(x, 0, calls.clone());

        lazy.get(&source).unwrap();
        lazy.get(&source).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(lazy.cached_len(), 0);
    }

    #[test]
    fn function_errors_are_not_cached() {
        let x = NodeId::new();
        let mut source = MockSource::default();
        source.set(x, 1.0);

        let fun: ComputeFn = Arc::new(|_: &Arguments| -> Result<Value> { Err(Error::function("boom")) });
        let lazy = LazyFunction::new(fun, IndexMap::new(), [x], 2);

        assert!(lazy.get(&source).is_err());
        assert_eq!(lazy.cached_len(), 0);
    }
}
