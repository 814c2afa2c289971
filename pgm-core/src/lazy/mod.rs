//! Lazy Evaluation
//!
//! This module implements the memoized evaluator behind every computed
//! quantity in the model.
//!
//! # Concepts
//!
//! ## Stamps
//!
//! Every value assigned to a stochastic node carries a unique [`Stamp`].
//! Stamps play the role of object identity: a cached result is reusable
//! exactly when every stochastic value it was computed from still carries
//! the same stamp.
//!
//! ## Lazy Functions
//!
//! A [`LazyFunction`] wraps a user function together with its argument
//! bindings and its ultimate arguments. It recomputes only when the stamps
//! change and keeps a small number of recent results, so a rejected
//! proposal followed by a revert does not recompute anything.
//!
//! ## Arguments
//!
//! User functions receive an [`Arguments`] view with typed accessors over
//! the resolved parent values.

mod arguments;
mod function;
mod stamp;

pub use arguments::{Arguments, ParentValue};
pub use function::{resolve_arguments, ArgumentSource, ComputeFn, LazyFunction};
pub use stamp::Stamp;
