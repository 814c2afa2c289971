//! PGM Core
//!
//! This crate provides the dependency-graph and lazy-recomputation core of a
//! probabilistic modeling engine. It implements:
//!
//! - Stochastic, deterministic and potential nodes
//! - Parent bindings that can be rebound at runtime
//! - Extended parent/child closures that collapse deterministic nodes
//! - Markov-blanket derivation for sampling algorithms
//! - Memoized evaluation of values and log-densities
//!
//! Sampling algorithms drive a [`Model`] by repeatedly setting values,
//! reading log-densities and reverting rejected proposals. The model keeps
//! every value and log-density consistent with the current graph.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: Value payloads, element types and coercion
//! - `graph`: Relation registry, closures and containers
//! - `lazy`: Memoized evaluator keyed by version stamps
//! - `variable`: Builders and per-kind state for the three node kinds
//! - `model`: The arena tying everything together
//!
//! # Example
//!
//! ```rust,ignore
//! use pgm_core::{Model, Stochastic, Deterministic, Value};
//!
//! let mut model = Model::new();
//!
//! // A prior on the mean
//! let mu = model.add_stochastic(
//!     Stochastic::new("mu", |args| Ok(Value::from(-0.5 * args.f64("value")?.powi(2))))
//!         .value(0.0),
//! )?;
//!
//! // A shifted mean
//! let shifted = model.add_deterministic(
//!     Deterministic::new("shifted", |args| Ok(Value::from(args.f64("mu")? + 1.0)))
//!         .parent("mu", mu),
//! )?;
//!
//! // Observed data depending on the shifted mean
//! let x = model.add_stochastic(
//!     Stochastic::new("x", |args| {
//!         let d = args.f64("value")? - args.f64("mean")?;
//!         Ok(Value::from(-0.5 * d * d))
//!     })
//!     .parent("mean", shifted)
//!     .value(1.5)
//!     .observed(),
//! )?;
//!
//! // The deterministic node is collapsed out of the extended relations
//! assert!(model.extended_parents(x)?.contains(&mu));
//! assert!(model.extended_children(mu)?.contains(&x));
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod lazy;
pub mod model;
pub mod value;
pub mod variable;

pub use config::ModelConfig;
pub use error::{Error, Result};
pub use graph::{extend_children, extend_parents, Container, ContainerId, NodeId, NodeKind, Parent};
pub use lazy::{Arguments, ParentValue, Stamp};
pub use model::{Model, Trace};
pub use value::{Dtype, Value, LOG_ZERO};
pub use variable::{Deterministic, Potential, Stochastic};
