//! The rule evaluator.
//!
//! # How Evaluation Works
//!
//! `evaluate` walks a compiled [`Expr`]. Literals are returned as they are,
//! arrays are evaluated element by element and a lazy node met directly is
//! simply unwrapped. For an operation, the interpreter first looks at the
//! operator name:
//!
//! - Control flow (`if`, `and`, `or`, `def`) and the combinators (`$show`,
//!   `$for`) receive their argument expressions unevaluated.
//! - Every other operator receives [`Arg`]s. A lazy argument arrives as
//!   [`Arg::Deferred`], a thunk closing over the rule and the context at the
//!   call site; anything else is evaluated first.
//!
//! The context is an explicit parameter. Closures that outlive the call
//! (effect bodies, cleanups, branches, lambdas) capture a clone of it, so
//! re-running them later sees exactly the bindings visible where they were
//! written and nothing from sibling evaluations.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::reactive::{GlobalRegistry, Owner};

use super::config::InterpreterConfig;
use super::context::Context;
use super::error::RuleError;
use super::expr::{Compiler, Expr};
use super::operators;
use super::value::{Function, Value};

/// A host operator: called with the evaluated arguments.
pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Value, RuleError> + Send + Sync>;

/// Operators handled by the interpreter itself.
const INTERPRETER_OPERATORS: &[&str] = &[
    "var", "if", "?:", "and", "or", "def", "call", "lambda", "$state", "$global", "$set",
    "$effect", "$cleanup", "$show", "$for",
];

/// A deferred rule body bound to the context it was written in.
#[derive(Clone)]
pub struct Thunk {
    interpreter: Interpreter,
    rule: Arc<Expr>,
    context: Context,
}

impl Thunk {
    /// Evaluate the body against its captured context.
    pub fn run(&self) -> Result<Value, RuleError> {
        self.interpreter.evaluate(&self.rule, &self.context)
    }

    /// Evaluate the body against another context, usually an extension of
    /// the captured one.
    pub fn run_in(&self, context: &Context) -> Result<Value, RuleError> {
        self.interpreter.evaluate(&self.rule, context)
    }

    /// The context captured at the call site.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The deferred expression.
    pub fn rule(&self) -> &Expr {
        &self.rule
    }

    /// A zero-argument function value that runs the body.
    pub fn into_function(self) -> Function {
        Function::new(move |_| self.run())
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thunk").field("rule", &self.rule).finish()
    }
}

/// An operator argument.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    Deferred(Thunk),
}

impl Arg {
    /// The argument's value, running a deferred body if needed.
    pub fn force(self) -> Result<Value, RuleError> {
        match self {
            Arg::Value(value) => Ok(value),
            Arg::Deferred(thunk) => thunk.run(),
        }
    }

    /// The argument as a value, a deferred body becoming a function.
    pub fn into_value(self) -> Value {
        match self {
            Arg::Value(value) => value,
            Arg::Deferred(thunk) => Value::Function(thunk.into_function()),
        }
    }
}

/// The result of [`Interpreter::run_logic`]: the value the rule produced and
/// the root scope everything it created belongs to.
///
/// The reactive graph stays live until [`Run::dispose`] is called.
#[derive(Debug)]
pub struct Run {
    result: Value,
    root: Owner,
}

impl Run {
    pub fn result(&self) -> &Value {
        &self.result
    }

    /// The root scope.
    pub fn root(&self) -> &Owner {
        &self.root
    }

    /// Tear down every effect, branch and cleanup the rule created.
    pub fn dispose(&self) {
        self.root.dispose();
    }

    pub fn into_parts(self) -> (Value, Owner) {
        (self.result, self.root)
    }
}

/// A rule interpreter.
///
/// Cloning is cheap; clones share configuration, host operators and the
/// global registry.
///
/// # Example
///
/// ```rust
/// use reflex_core::rules::{Context, Interpreter, Value};
/// use serde_json::json;
///
/// let interpreter = Interpreter::new();
/// let expr = interpreter.compile(&json!({"+": [1, {"var": "x"}]}));
/// let value = interpreter.evaluate(&expr, &Context::new().with("x", 2)).unwrap();
/// assert_eq!(value, Value::from(3));
/// ```
#[derive(Clone)]
pub struct Interpreter {
    pub(super) config: Arc<InterpreterConfig>,
    pub(super) registry: Arc<GlobalRegistry>,
    operators: Arc<IndexMap<String, HostFn>>,
}

impl Interpreter {
    /// An interpreter with the default configuration and the process-wide
    /// global registry.
    pub fn new() -> Self {
        Self {
            config: Arc::new(InterpreterConfig::default()),
            registry: GlobalRegistry::shared(),
            operators: Arc::new(IndexMap::new()),
        }
    }

    /// An interpreter with a custom configuration.
    pub fn with_config(config: InterpreterConfig) -> Result<Self, RuleError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            ..Self::new()
        })
    }

    /// Use `registry` for `$global` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<GlobalRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Register a host operator. It takes precedence over a base operator
    /// of the same name; the interpreter's own operators cannot be replaced.
    pub fn with_operator<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuleError> + Send + Sync + 'static,
    {
        let name = name.into();
        if INTERPRETER_OPERATORS.contains(&name.as_str()) {
            tracing::warn!(operator = %name, "cannot override a built-in operator");
            return self;
        }
        Arc::make_mut(&mut self.operators).insert(name, Arc::new(f));
        self
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<GlobalRegistry> {
        &self.registry
    }

    /// Whether `name` compiles to an operation.
    pub fn is_operator(&self, name: &str) -> bool {
        INTERPRETER_OPERATORS.contains(&name)
            || operators::BASE_OPERATORS.contains(&name)
            || self.operators.contains_key(name)
    }

    /// Compile a JSON document.
    pub fn compile(&self, document: &serde_json::Value) -> Expr {
        let is_operator = |name: &str| self.is_operator(name);
        Compiler {
            lazy_tag: &self.config.lazy_tag,
            is_operator: &is_operator,
        }
        .compile(document)
    }

    /// Parse and compile a JSON string.
    pub fn compile_str(&self, source: &str) -> Result<Expr, RuleError> {
        let document: serde_json::Value = serde_json::from_str(source)?;
        Ok(self.compile(&document))
    }

    /// Decode and compile a MessagePack document.
    pub fn compile_msgpack(&self, bytes: &[u8]) -> Result<Expr, RuleError> {
        let document: serde_json::Value = rmp_serde::from_slice(bytes)?;
        Ok(self.compile(&document))
    }

    /// Evaluate `expr` under a fresh root scope.
    ///
    /// On error the root is disposed before returning, so nothing the rule
    /// created before failing stays alive.
    pub fn run_logic(&self, expr: &Expr, context: Context) -> Result<Run, RuleError> {
        let root = Owner::new_root();
        tracing::debug!(root = root.id(), "running rule");
        match root.run(|| self.evaluate(expr, &context)) {
            Ok(result) => Ok(Run { result, root }),
            Err(error) => {
                tracing::debug!(root = root.id(), %error, "rule failed, disposing root");
                root.dispose();
                Err(error)
            }
        }
    }

    /// Compile and run a JSON document.
    pub fn run_json(&self, document: &serde_json::Value, context: Context) -> Result<Run, RuleError> {
        self.run_logic(&self.compile(document), context)
    }

    /// Evaluate `expr` against `context`.
    pub fn evaluate(&self, expr: &Expr, context: &Context) -> Result<Value, RuleError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item, context))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Lazy(rule) => self.evaluate(rule, context),
            Expr::Op { name, args } => self.apply(name, args, context),
        }
    }

    fn apply(&self, name: &str, args: &[Expr], context: &Context) -> Result<Value, RuleError> {
        match name {
            "if" | "?:" => self.branch(args, context),
            "and" => self.short_circuit(args, context, false),
            "or" => self.short_circuit(args, context, true),
            "def" => self.define(args, context),
            "$show" => self.show(args, context),
            "$for" => self.each(args, context),
            _ => {
                let args = args
                    .iter()
                    .map(|arg| self.arg(arg, context))
                    .collect::<Result<Vec<_>, _>>()?;
                self.dispatch(name, args, context)
            }
        }
    }

    fn dispatch(&self, name: &str, args: Vec<Arg>, context: &Context) -> Result<Value, RuleError> {
        match name {
            "var" => Self::var(args, context),
            "call" => Self::call(args),
            "lambda" => self.lambda(args),
            "$state" => Self::state(args),
            "$global" => self.global(args),
            "$set" => Self::set(args),
            "$effect" => self.effect(args),
            "$cleanup" => self.cleanup(args),
            _ => {
                if let Some(host) = self.operators.get(name) {
                    let values: Vec<Value> = args.into_iter().map(Arg::into_value).collect();
                    return host(&values);
                }
                let values = args
                    .into_iter()
                    .map(Arg::force)
                    .collect::<Result<Vec<_>, _>>()?;
                operators::apply(name, &values)
                    .unwrap_or_else(|| Err(RuleError::invalid(name, "unknown operator")))
            }
        }
    }

    /// Turn an argument expression into an [`Arg`].
    pub(super) fn arg(&self, expr: &Expr, context: &Context) -> Result<Arg, RuleError> {
        match expr {
            Expr::Lazy(rule) => Ok(Arg::Deferred(Thunk {
                interpreter: self.clone(),
                rule: rule.clone(),
                context: context.clone(),
            })),
            other => self.evaluate(other, context).map(Arg::Value),
        }
    }

    /// Extract a deferred body. An eager argument was already evaluated by
    /// the time it gets here; it is ignored, or rejected in strict mode.
    pub(super) fn deferred(
        &self,
        operator: &str,
        position: usize,
        arg: Option<Arg>,
    ) -> Result<Option<Thunk>, RuleError> {
        match arg {
            Some(Arg::Deferred(thunk)) => Ok(Some(thunk)),
            _ if self.config.strict_lazy => Err(RuleError::ExpectedLazy {
                operator: operator.to_string(),
                position,
            }),
            _ => {
                tracing::warn!(operator, position, "expected a lazy node, ignoring the argument");
                Ok(None)
            }
        }
    }

    /// `[cond, then, cond, then, ..., else]`
    fn branch(&self, args: &[Expr], context: &Context) -> Result<Value, RuleError> {
        let mut rest = args;
        loop {
            match rest {
                [] => return Ok(Value::Null),
                [otherwise] => return self.evaluate(otherwise, context),
                [condition, then, tail @ ..] => {
                    if self.evaluate(condition, context)?.is_truthy() {
                        return self.evaluate(then, context);
                    }
                    rest = tail;
                }
            }
        }
    }

    /// `and` stops at the first falsy value, `or` at the first truthy one.
    fn short_circuit(&self, args: &[Expr], context: &Context, stop_on: bool) -> Result<Value, RuleError> {
        let mut last = Value::Null;
        for arg in args {
            last = self.evaluate(arg, context)?;
            if last.is_truthy() == stop_on {
                break;
            }
        }
        Ok(last)
    }

    fn define(&self, args: &[Expr], context: &Context) -> Result<Value, RuleError> {
        let [name, value, rule, ..] = args else {
            return Err(RuleError::invalid("def", "expected [name, value, rule]"));
        };
        let name = match self.evaluate(name, context)? {
            Value::String(name) => name,
            other => return Err(RuleError::invalid("def", format!("name must be a string, got {other}"))),
        };
        let value = self.evaluate(value, context)?;
        self.evaluate(rule, &context.extend(name, value))
    }

    fn var(args: Vec<Arg>, context: &Context) -> Result<Value, RuleError> {
        let mut args = args.into_iter();
        let path = args.next().map(Arg::force).transpose()?.unwrap_or_default();
        let path = match path {
            Value::Null => String::new(),
            other => other.to_display_string(),
        };
        match context.lookup(&path) {
            Some(value) => Ok(value),
            None => Ok(args.next().map(Arg::force).transpose()?.unwrap_or_default()),
        }
    }

    fn call(args: Vec<Arg>) -> Result<Value, RuleError> {
        let mut args = args.into_iter();
        let target = args.next().map(Arg::force).transpose()?.unwrap_or_default();
        let rest: Vec<Value> = args.map(Arg::into_value).collect();
        match target {
            Value::Function(function) => function.call(&rest),
            other => {
                tracing::warn!(target = %other, "call target is not a function");
                Ok(Value::Null)
            }
        }
    }

    fn lambda(&self, args: Vec<Arg>) -> Result<Value, RuleError> {
        let body = self.deferred("lambda", 0, args.into_iter().next())?;
        Ok(Value::Function(match body {
            Some(thunk) => thunk.into_function(),
            None => Function::new(|_| Ok(Value::Null)),
        }))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("config", &self.config)
            .field("operators", &self.operators.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn eval(document: serde_json::Value, context: Context) -> Value {
        let interpreter = Interpreter::new();
        interpreter.evaluate(&interpreter.compile(&document), &context).unwrap()
    }

    #[test]
    fn var_with_paths_and_defaults() {
        let ctx = Context::from_json(json!({"a": {"b": [10, 20]}})).unwrap();
        assert_eq!(eval(json!({"var": "a.b.1"}), ctx.clone()), Value::from(20));
        assert_eq!(eval(json!({"var": ["a.z", 7]}), ctx.clone()), Value::from(7));
        assert_eq!(eval(json!({"var": "nothing"}), ctx), Value::Null);
    }

    #[test]
    fn if_evaluates_only_the_taken_branch() {
        let calls = Arc::new(AtomicI32::new(0));
        let counter = calls.clone();
        let ctx = Context::new().with(
            "boom",
            Function::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }),
        );

        let value = eval(
            json!({"if": [false, {"call": [{"var": "boom"}]}, {"<": [1, 2]}, "yes", "no"]}),
            ctx,
        );
        assert_eq!(value, Value::from("yes"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn and_or_short_circuit() {
        assert_eq!(eval(json!({"and": [1, 0, {"var": "x"}]}), Context::new()), Value::from(0));
        assert_eq!(eval(json!({"or": [0, "", "hit", 3]}), Context::new()), Value::from("hit"));
    }

    #[test]
    fn def_binds_for_its_body_only() {
        let value = eval(
            json!({"merge": [
                {"def": ["x", 5, {"*": [{"var": "x"}, 2]}]},
                {"var": ["x", "unbound"]}
            ]}),
            Context::new(),
        );
        assert_eq!(value.to_json(), json!([10, "unbound"]));
    }

    #[test]
    fn lazy_node_evaluated_directly_is_unwrapped() {
        assert_eq!(eval(json!({"lazy": true, "rule": {"+": [1, 1]}}), Context::new()), Value::from(2));
    }

    #[test]
    fn call_passes_arguments_and_ignores_non_functions() {
        let ctx = Context::new().with(
            "sum",
            Function::new(|args| Ok(Value::from(args.iter().map(Value::to_number).sum::<f64>()))),
        );
        assert_eq!(eval(json!({"call": [{"var": "sum"}, 1, 2, 3]}), ctx), Value::from(6));
        assert_eq!(eval(json!({"call": [5, 1]}), Context::new()), Value::Null);
    }

    #[test]
    fn lambda_captures_definition_context() {
        let value = eval(
            json!({"def": ["f",
                {"def": ["n", 41, {"lambda": {"lazy": true, "rule": {"+": [{"var": "n"}, 1]}}}]},
                {"def": ["n", 0, {"call": [{"var": "f"}, 100]}]}
            ]}),
            Context::new(),
        );
        assert_eq!(value, Value::from(42));
    }

    #[test]
    fn host_operators_receive_evaluated_arguments() {
        let interpreter = Interpreter::new().with_operator("upper", |args| {
            Ok(Value::from(args.first().map(Value::to_display_string).unwrap_or_default().to_uppercase()))
        });
        let expr = interpreter.compile(&json!({"upper": {"var": "name"}}));
        let value = interpreter.evaluate(&expr, &Context::new().with("name", "ada")).unwrap();
        assert_eq!(value, Value::from("ADA"));
    }

    #[test]
    fn built_in_operators_cannot_be_replaced() {
        let interpreter = Interpreter::new().with_operator("var", |_| Ok(Value::from("hijacked")));
        let expr = interpreter.compile(&json!({"var": "x"}));
        let value = interpreter.evaluate(&expr, &Context::new().with("x", 1)).unwrap();
        assert_eq!(value, Value::from(1));
    }

    #[test]
    fn custom_lazy_tag() {
        let config = InterpreterConfig::from_json_str(r#"{"lazy_tag": "defer"}"#).unwrap();
        let interpreter = Interpreter::with_config(config).unwrap();
        assert!(interpreter.compile(&json!({"defer": true, "rule": 1})).is_lazy());
        assert!(!interpreter.compile(&json!({"lazy": true, "rule": 1})).is_lazy());
    }

    #[test]
    fn documents_decode_from_text_and_msgpack() {
        let interpreter = Interpreter::new();
        let document = json!({"cat": ["a", {"var": "b"}]});
        let from_text = interpreter.compile_str(&document.to_string()).unwrap();
        let bytes = rmp_serde::to_vec(&document).unwrap();
        let from_msgpack = interpreter.compile_msgpack(&bytes).unwrap();
        assert_eq!(from_text, from_msgpack);

        assert!(matches!(interpreter.compile_str("{"), Err(RuleError::Json(_))));
        assert!(matches!(interpreter.compile_msgpack(&[0xc1]), Err(RuleError::MsgPack(_))));
    }
}
