//! Integration Tests for the Rule Interpreter
//!
//! End-to-end scenarios: documents in, reactive graphs and host callbacks
//! out.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use reflex_core::reactive::GlobalRegistry;
use reflex_core::rules::{run_logic, Context, Function, Interpreter, InterpreterConfig, RuleError, Value};

/// A host function counting its calls.
fn counting() -> (Arc<AtomicI32>, Function) {
    let calls = Arc::new(AtomicI32::new(0));
    let inner = calls.clone();
    let function = Function::new(move |_| {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    });
    (calls, function)
}

fn reader(value: &Value) -> &Function {
    value.as_function().expect("a reader function")
}

/// Test that `$state` yields a reader whose attached writer updates it.
#[test]
fn state_reader_and_writer() {
    let run = run_logic(&json!({"$state": 0}), Context::new()).unwrap();
    let count = reader(run.result());

    assert_eq!(count.call(&[]).unwrap(), Value::from(0));
    count.write(Value::from(5)).expect("writer").unwrap();
    assert_eq!(count.call(&[]).unwrap(), Value::from(5));
    run.dispose();
}

/// Test that `$show` with a true condition runs only the true branch.
#[test]
fn show_true_runs_only_positive_branch() {
    let (pos_calls, pos) = counting();
    let (neg_calls, neg) = counting();

    let run = run_logic(
        &json!({"$show": [true,
            {"lazy": true, "rule": {"call": [{"var": "pos"}]}},
            {"lazy": true, "rule": {"call": [{"var": "neg"}]}}
        ]}),
        Context::new().with("pos", pos).with("neg", neg),
    )
    .unwrap();

    assert_eq!(pos_calls.load(Ordering::SeqCst), 1);
    assert_eq!(neg_calls.load(Ordering::SeqCst), 0);
    run.dispose();
}

/// Test that `$for` calls the child once per item, in order, with `item`
/// bound to that element.
#[test]
fn for_calls_spy_per_item() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let spy = {
        let seen = seen.clone();
        Function::new(move |args| {
            seen.lock().push(args.to_vec());
            Ok(Value::Null)
        })
    };

    let run = run_logic(
        &json!({"$for": [[1, 2, 3],
            {"lazy": true, "rule": {"call": [{"var": "spy"}, {"var": "item"}]}}
        ]}),
        Context::new().with("spy", spy),
    )
    .unwrap();

    assert_eq!(
        *seen.lock(),
        vec![vec![Value::from(1)], vec![Value::from(2)], vec![Value::from(3)]]
    );
    run.dispose();
}

/// Test that `$global` shares a signal by key and fails for a missing key
/// without an initial value.
#[test]
fn global_round_trip_and_missing_key() {
    let interpreter = Interpreter::new().with_registry(Arc::new(GlobalRegistry::new()));

    let created = interpreter
        .run_json(&json!({"$global": ["k", 1]}), Context::new())
        .unwrap();
    let found = interpreter
        .run_json(&json!({"$global": ["k"]}), Context::new())
        .unwrap();
    assert_eq!(reader(found.result()).call(&[]).unwrap(), Value::from(1));
    reader(created.result()).write(Value::from(2)).expect("writer").unwrap();
    assert_eq!(reader(found.result()).call(&[]).unwrap(), Value::from(2));

    let err = interpreter
        .run_json(&json!({"$global": "missing"}), Context::new())
        .unwrap_err();
    assert!(matches!(err, RuleError::Registry(_)));
}

/// Test that an effect declared in a rule tracks state and stops after the
/// run is disposed, running its cleanup exactly once.
#[test]
fn rule_effect_lifecycle() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let record = {
        let log = log.clone();
        Function::new(move |args| {
            log.lock().push(args.iter().map(Value::to_display_string).collect::<Vec<_>>().join(" "));
            Ok(Value::Null)
        })
    };

    let run = run_logic(
        &json!({"def": ["count", {"$state": 0}, {"merge": [
            {"$effect": {"lazy": true, "rule": {"merge": [
                {"call": [{"var": "record"}, "run", {"call": [{"var": "count"}]}]},
                {"$cleanup": {"lazy": true, "rule": {"call": [{"var": "record"}, "cleanup"]}}}
            ]}}},
            {"var": "count"}
        ]}]}),
        Context::new().with("record", record),
    )
    .unwrap();

    let Value::Array(parts) = run.result() else {
        panic!("expected an array");
    };
    let count = reader(&parts[1]);
    count.write(Value::from(1)).expect("writer").unwrap();
    run.dispose();
    count.write(Value::from(2)).expect("writer").unwrap();

    assert_eq!(*log.lock(), vec!["run 0", "cleanup", "run 1", "cleanup"]);
}

/// Test that sibling `def` scopes never see each other's bindings.
#[test]
fn contexts_do_not_leak_between_siblings() {
    let run = run_logic(
        &json!({"merge": [
            {"def": ["x", 1, {"var": "x"}]},
            {"var": ["x", "none"]},
            {"def": ["x", 2, {"var": "x"}]}
        ]}),
        Context::new(),
    )
    .unwrap();
    assert_eq!(run.result().to_json(), json!([1, "none", 2]));
}

/// Test that a failing rule disposes everything it created before failing.
#[test]
fn failed_run_leaves_no_live_scope() {
    let (cleanups, done) = counting();
    let fail = Function::new(|_| Err(RuleError::host("boom")));

    let err = run_logic(
        &json!({"merge": [
            {"$cleanup": {"lazy": true, "rule": {"call": [{"var": "done"}]}}},
            {"call": [{"var": "fail"}]}
        ]}),
        Context::new().with("done", done).with("fail", fail),
    )
    .unwrap_err();

    assert!(matches!(err, RuleError::Host(ref message) if message == "boom"));
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

/// Test that strict mode rejects an eager `$show` branch while permissive
/// mode degrades it to an empty branch.
#[test]
fn strict_lazy_rejects_eager_bodies() {
    let document = json!({"$show": [true, "eager"]});

    let permissive = run_logic(&document, Context::new()).unwrap();
    assert_eq!(reader(permissive.result()).call(&[]).unwrap(), Value::Null);

    let config = InterpreterConfig::from_json_str(r#"{"strict_lazy": true}"#).unwrap();
    let strict = Interpreter::with_config(config).unwrap();
    let err = strict.run_json(&document, Context::new()).unwrap_err();
    assert!(matches!(err, RuleError::ExpectedLazy { position: 1, .. }));
}

/// Test that documents decoded from MessagePack run like JSON ones.
#[test]
fn msgpack_documents_run() {
    let interpreter = Interpreter::new();
    let bytes = rmp_serde::to_vec(&json!({"+": [{"var": "a"}, 2]})).unwrap();
    let expr = interpreter.compile_msgpack(&bytes).unwrap();

    let run = interpreter.run_logic(&expr, Context::new().with("a", 40)).unwrap();
    assert_eq!(run.result(), &Value::from(42));
}

/// Test that a condition failing during construction aborts `$show` before
/// either branch runs, and that a condition failing on a later write fails
/// that write without switching branches.
#[test]
fn show_condition_failures_never_switch_branches() {
    let (neg_calls, neg) = counting();
    let check = Function::new(|args| match args.first() {
        Some(Value::Number(n)) if *n < 0.0 => Err(RuleError::host("negative")),
        Some(value) => Ok(value.clone()),
        None => Ok(Value::Null),
    });
    let context = Context::new().with("check", check).with("neg", neg);

    let err = run_logic(
        &json!({"$show": [{"call": [{"var": "check"}, -1]},
            {"lazy": true, "rule": 1},
            {"lazy": true, "rule": {"call": [{"var": "neg"}]}}
        ]}),
        context.clone(),
    )
    .unwrap_err();
    assert!(matches!(err, RuleError::Host(ref message) if message == "negative"));
    assert_eq!(neg_calls.load(Ordering::SeqCst), 0);

    let run = run_logic(
        &json!({"def": ["n", {"$state": 1}, {"merge": [
            {"$show": [{"call": [{"var": "check"}, {"call": [{"var": "n"}]}]},
                {"lazy": true, "rule": "pos"},
                {"lazy": true, "rule": {"call": [{"var": "neg"}]}}
            ]},
            {"var": "n"}
        ]}]}),
        context,
    )
    .unwrap();
    let Value::Array(parts) = run.result() else {
        panic!("expected an array");
    };

    let outcome = reader(&parts[1]).write(Value::from(-5)).expect("writer");
    assert!(outcome.is_err());
    assert_eq!(neg_calls.load(Ordering::SeqCst), 0);
    assert_eq!(reader(&parts[0]).call(&[]).unwrap(), Value::from("pos"));
    run.dispose();
}
