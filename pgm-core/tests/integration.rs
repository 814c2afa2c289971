//! Integration Tests for the Model
//!
//! These tests drive a model the way a sampler does: build a graph, read
//! log-densities, propose values, revert, and rebind parents.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use pgm_core::{Arguments, Deterministic, Error, Model, NodeId, Potential, Result, Stochastic, Value};

fn normal(args: &Arguments) -> Result<Value> {
    let d = args.f64("value")? - args.f64("mu")?;
    Ok(Value::from(-0.5 * d * d))
}

fn flat(_: &Arguments) -> Result<Value> {
    Ok(Value::from(0.0))
}

fn prior(model: &mut Model, name: &str, value: f64) -> NodeId {
    model
        .add_stochastic(Stochastic::new(name, flat).value(value))
        .unwrap()
}

/// Test that a deterministic node is collapsed out of both closures.
#[test]
fn chain_collapses_deterministic_node() {
    let mut model = Model::new();
    let s1 = prior(&mut model, "s1", 1.0);
    let d1 = model
        .add_deterministic(
            Deterministic::new("d1", |args| Ok(Value::from(args.f64("x")? * 3.0))).parent("x", s1),
        )
        .unwrap();
    let s2 = model
        .add_stochastic(Stochastic::new("s2", normal).parent("mu", d1).value(3.0))
        .unwrap();

    let parents: Vec<_> = model.extended_parents(s2).unwrap().iter().copied().collect();
    let children: Vec<_> = model.extended_children(s1).unwrap().iter().copied().collect();
    assert_eq!(parents, vec![s1]);
    assert_eq!(children, vec![s2]);

    // Direct children still list the deterministic node
    assert_eq!(model.children(s1).unwrap(), vec![d1]);
    assert_eq!(model.logp(s2).unwrap(), 0.0);
    model.check_consistency().unwrap();
}

/// Test that only the missing entry of observed data is drawn and written.
#[test]
fn observed_array_with_missing_entry() {
    let mut model = Model::new();
    let x = model
        .add_stochastic(
            Stochastic::new("x", flat)
                .partial_value(vec![Some(1.0), Some(2.0), None])
                .random(|_| Ok(Value::from(vec![10.0, 20.0, 30.0])))
                .observed(),
        )
        .unwrap();

    // Construction filled only the third entry
    assert_eq!(model.value(x).unwrap(), Value::from(vec![1.0, 2.0, 30.0]));
    assert_eq!(model.missing(x).unwrap(), &[2]);

    // A full replacement only updates the missing entry
    model.set_value(x, vec![7.0, 8.0, 9.0]).unwrap();
    assert_eq!(model.value(x).unwrap(), Value::from(vec![1.0, 2.0, 9.0]));

    // Shape mismatches are rejected without changing anything
    let err = model.set_value(x, vec![1.0]).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    assert_eq!(model.value(x).unwrap(), Value::from(vec![1.0, 2.0, 9.0]));
}

/// Test that fully observed data cannot be overwritten.
#[test]
fn fully_observed_data_is_fixed() {
    let mut model = Model::new();
    let x = model
        .add_stochastic(Stochastic::new("x", flat).value(vec![1.0, 2.0]).observed())
        .unwrap();

    let err = model.set_value(x, vec![3.0, 4.0]).unwrap_err();
    assert!(matches!(err, Error::DataIsFixed { .. }));
    assert_eq!(model.value(x).unwrap(), Value::from(vec![1.0, 2.0]));
}

/// Test that a potential reaching log(0) raises a zero-probability error on read.
#[test]
fn potential_at_log_zero() {
    let mut model = Model::new();
    let a = prior(&mut model, "a", 1.0);
    let p = model
        .add_potential(
            Potential::new("p", |args| {
                let a = args.f64("a")?;
                Ok(Value::from(if a > 0.0 { 0.0 } else { f64::NEG_INFINITY }))
            })
            .parent("a", a),
        )
        .unwrap();
    assert_eq!(model.logp(p).unwrap(), 0.0);

    model.set_value(a, -1.0).unwrap();
    let err = model.logp(p).unwrap_err();
    assert!(err.is_zero_probability());
    match err {
        Error::ZeroProbability { name, value, parents, .. } => {
            assert_eq!(name, "p");
            assert!(value.is_none());
            assert!(parents.contains_key("a"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The model keeps working afterwards
    model.revert(a).unwrap();
    assert_eq!(model.logp(p).unwrap(), 0.0);
}

/// Test that the sentinel itself counts as log(0).
#[test]
fn log_zero_sentinel_is_inclusive() {
    let mut model = Model::new();
    let a = prior(&mut model, "a", 1.0);
    let p = model
        .add_potential(
            Potential::new("p", |args| {
                let a = args.f64("a")?;
                Ok(Value::from(if a > 0.0 { 0.0 } else { pgm_core::LOG_ZERO }))
            })
            .parent("a", a),
        )
        .unwrap();

    model.set_value(a, 0.0).unwrap();
    assert!(model.logp(p).unwrap_err().is_zero_probability());
}

/// Test that a model cannot be built in a zero-probability state.
#[test]
fn construction_at_log_zero_fails() {
    let mut model = Model::new();
    let a = prior(&mut model, "a", 1.0);

    let err = model
        .add_potential(
            Potential::new("p", |_| Ok(Value::from(f64::NEG_INFINITY))).parent("a", a),
        )
        .unwrap_err();
    assert!(err.is_zero_probability());
    assert_eq!(model.lookup("p"), None);
    assert!(model.children(a).unwrap().is_empty());
    model.check_consistency().unwrap();
}

/// Test that a deterministic value cannot be written.
#[test]
fn deterministic_is_immutable() {
    let mut model = Model::new();
    let a = prior(&mut model, "a", 2.0);
    let d = model
        .add_deterministic(
            Deterministic::new("d", |args| Ok(Value::from(args.f64("a")? + 1.0))).parent("a", a),
        )
        .unwrap();

    assert_eq!(model.value(d).unwrap(), Value::from(3.0));
    let err = model.set_value(d, 10.0).unwrap_err();
    assert!(matches!(err, Error::ImmutableValue { .. }));
    assert_eq!(model.value(d).unwrap(), Value::from(3.0));
}

/// Test that rebinding moves child registrations and closures.
#[test]
fn rebind_moves_registrations() {
    let mut model = Model::new();
    let a = prior(&mut model, "a", 1.0);
    let b = prior(&mut model, "b", 5.0);
    let x = model
        .add_stochastic(Stochastic::new("x", normal).parent("mu", a).value(5.0))
        .unwrap();
    assert_eq!(model.logp(x).unwrap(), -8.0);

    model.rebind(x, "mu", b).unwrap();

    assert!(model.children(a).unwrap().is_empty());
    assert_eq!(model.children(b).unwrap(), vec![x]);
    assert!(model.extended_parents(x).unwrap().contains(&b));
    assert!(!model.extended_parents(x).unwrap().contains(&a));
    assert!(model.extended_children(a).unwrap().is_empty());
    assert!(model.extended_children(b).unwrap().contains(&x));

    // The evaluator reads b's current value
    assert_eq!(model.logp(x).unwrap(), 0.0);
    model.check_consistency().unwrap();
}

/// Test that rebinding to a constant only drops registrations.
#[test]
fn rebind_to_constant() {
    let mut model = Model::new();
    let a = prior(&mut model, "a", 1.0);
    let x = model
        .add_stochastic(Stochastic::new("x", normal).parent("mu", a).value(1.0))
        .unwrap();

    model.rebind(x, "mu", 3.0).unwrap();
    assert!(model.children(a).unwrap().is_empty());
    assert!(model.extended_parents(x).unwrap().is_empty());
    assert_eq!(model.logp(x).unwrap(), -2.0);
}

/// Test that reverting a rejected proposal reuses the cached log-density.
#[test]
fn revert_hits_evaluator_cache() {
    let calls = Arc::new(AtomicI32::new(0));
    let counter = calls.clone();

    let mut model = Model::new();
    let x = model
        .add_stochastic(
            Stochastic::new("x", move |args| {
                counter.fetch_add(1, Ordering::SeqCst);
                normal(args)
            })
            .parent("mu", 0.0)
            .value(1.0),
        )
        .unwrap();

    // Construction forces one computation
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(model.logp(x).unwrap(), -0.5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Propose, evaluate, reject
    model.set_value(x, 2.0).unwrap();
    assert_eq!(model.logp(x).unwrap(), -2.0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    model.revert(x).unwrap();

    assert_eq!(model.value(x).unwrap(), Value::from(1.0));
    assert_eq!(model.logp(x).unwrap(), -0.5);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test that a child's log-density also hits its cache after a revert.
#[test]
fn revert_hits_downstream_caches() {
    let calls = Arc::new(AtomicI32::new(0));
    let counter = calls.clone();

    let mut model = Model::new();
    let mu = prior(&mut model, "mu", 0.0);
    let shifted = model
        .add_deterministic(
            Deterministic::new("shifted", move |args| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(args.f64("mu")? + 1.0))
            })
            .parent("mu", mu),
        )
        .unwrap();
    let y = model
        .add_stochastic(Stochastic::new("y", normal).parent("mu", shifted).value(1.0).observed())
        .unwrap();
    assert_eq!(model.logp(y).unwrap(), 0.0);
    let baseline = calls.load(Ordering::SeqCst);

    model.set_value(mu, 1.0).unwrap();
    assert_eq!(model.logp(y).unwrap(), -0.5);
    model.revert(mu).unwrap();

    let recomputed = calls.load(Ordering::SeqCst);
    assert_eq!(model.logp(y).unwrap(), 0.0);
    assert_eq!(model.value(shifted).unwrap(), Value::from(1.0));
    assert_eq!(calls.load(Ordering::SeqCst), recomputed);
    assert_eq!(recomputed, baseline + 1);
}

/// Test that a rebind whose evaluator fails leaves the model untouched.
#[test]
fn failed_rebind_rolls_back() {
    let mut model = Model::new();
    let a = prior(&mut model, "a", 1.0);
    let flag = model
        .add_stochastic(Stochastic::new("flag", flat).value(true))
        .unwrap();
    let x = model
        .add_stochastic(Stochastic::new("x", normal).parent("mu", a).value(1.0))
        .unwrap();

    // `normal` cannot read a boolean mean
    let err = model.rebind(x, "mu", flag).unwrap_err();
    assert!(matches!(err, Error::Argument { .. }));

    assert_eq!(model.parents(x).unwrap().get("mu"), Some(&pgm_core::Parent::Node(a)));
    assert_eq!(model.children(a).unwrap(), vec![x]);
    assert!(model.children(flag).unwrap().is_empty());
    assert!(model.extended_children(a).unwrap().contains(&x));
    assert!(model.extended_children(flag).unwrap().is_empty());
    assert_eq!(model.logp(x).unwrap(), 0.0);
    model.check_consistency().unwrap();
}

/// Test that bindings which would close a cycle are rejected.
#[test]
fn cycles_are_rejected() {
    let mut model = Model::new();
    let a = model
        .add_stochastic(Stochastic::new("a", flat).parent("mu", 0.0).value(0.0))
        .unwrap();
    let d = model
        .add_deterministic(Deterministic::new("d", flat).parent("a", a))
        .unwrap();
    let b = model
        .add_stochastic(Stochastic::new("b", flat).parent("mu", d).value(0.0))
        .unwrap();

    let err = model.rebind(a, "mu", b).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));

    // Self-loops too
    let err = model.rebind(a, "mu", a).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));

    assert!(model.children(b).unwrap().is_empty());
    model.check_consistency().unwrap();
}

/// Test that a sampler-style loop keeps the graph consistent.
#[test]
fn metropolis_style_loop() {
    let mut model = Model::new();
    let mu = model
        .add_stochastic(Stochastic::new("mu", normal).parent("mu", 0.0).value(0.0))
        .unwrap();
    let data: Vec<NodeId> = [0.5, 1.5, 1.0]
        .iter()
        .enumerate()
        .map(|(i, &y)| {
            model
                .add_stochastic(
                    Stochastic::new(format!("y{i}"), normal)
                        .parent("mu", mu)
                        .value(y)
                        .observed(),
                )
                .unwrap()
        })
        .collect();

    // mu and every observation
    let blanket = model.markov_blanket(mu).unwrap();
    assert_eq!(blanket.len(), 1 + data.len());
    let terms: Vec<NodeId> = std::iter::once(mu)
        .chain(model.extended_children(mu).unwrap().iter().copied())
        .collect();
    assert_eq!(terms.len(), 1 + data.len());

    let mut current = model.joint_logp(terms.iter().copied()).unwrap();
    for proposal in [0.5, 3.0, 1.0, -2.0] {
        model.set_value(mu, proposal).unwrap();
        let proposed = model.joint_logp(terms.iter().copied()).unwrap();
        if proposed >= current {
            current = proposed;
        } else {
            model.revert(mu).unwrap();
        }
    }

    assert_eq!(model.value(mu).unwrap(), Value::from(1.0));
    assert_eq!(model.joint_logp(terms.iter().copied()).unwrap(), current);
    model.check_consistency().unwrap();
}
