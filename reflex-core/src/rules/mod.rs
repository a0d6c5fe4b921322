//! Rule Interpreter
//!
//! A tree-walking evaluator for a JSON expression language: a
//! JsonLogic-compatible base plus operators that build reactive graphs.
//!
//! # Document Format
//!
//! - An object with a single key naming a known operator is an operation.
//!   Its value is the argument list; a non-array value is a single argument.
//! - `{"lazy": true, "rule": <expr>}` (exactly those two keys) is a lazy
//!   node. Operators that take a body (`$effect`, `$cleanup`, `lambda`,
//!   the branches of `$show`, the child of `$for`) receive it unevaluated
//!   and run it later, possibly many times.
//! - Arrays are evaluated element by element. Any other value is a literal.
//!
//! # Reactive Operators
//!
//! | Operator | Result |
//! |----------|--------|
//! | `$state(initial)` | reader function, writer attached |
//! | `$global(key, initial?)` | same, backed by the global registry |
//! | `$set(ref, value)` | writes through `ref`'s writer |
//! | `$effect(lazy)` | re-runs the body when what it read changes |
//! | `$cleanup(lazy)` | runs the body when the current scope is disposed |
//! | `$show(when, lazy, lazy?)` | reader over the active branch's result |
//! | `$for(list, lazy)` | reader over the mapped list; binds `item`, `index` |
//! | `def(name, value, rule)` | evaluates `rule` with `name` bound |
//! | `call(f, ...args)` | invokes `f` |
//! | `lambda(lazy)` | a function evaluating the body when called |
//!
//! # Example
//!
//! ```rust
//! use reflex_core::rules::{run_logic, Context, Value};
//! use serde_json::json;
//!
//! let run = run_logic(&json!({"$state": 0}), Context::new()).unwrap();
//! let count = run.result().as_function().unwrap();
//!
//! count.write(Value::from(5)).unwrap().unwrap();
//! assert_eq!(count.call(&[]).unwrap(), Value::from(5));
//! run.dispose();
//! ```

mod config;
mod context;
mod error;
mod expr;
mod interpreter;
mod operators;
mod reactive_ops;
mod value;

pub use config::InterpreterConfig;
pub use context::Context;
pub use error::RuleError;
pub use expr::Expr;
pub use interpreter::{Arg, HostFn, Interpreter, Run, Thunk};
pub use value::{Function, Value};

/// Compile `document` and run it with a default interpreter.
pub fn run_logic(document: &serde_json::Value, context: Context) -> Result<Run, RuleError> {
    Interpreter::new().run_json(document, context)
}
