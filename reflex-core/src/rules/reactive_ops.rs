//! Reactive operators: `$state`, `$global`, `$set`, `$effect`, `$cleanup`,
//! `$show` and `$for`.
//!
//! Signals surface in rules as reader functions with a writer attached.
//! Calling the reader inside an effect body subscribes the effect, exactly
//! as `Signal::get` does from Rust.
//!
//! A write through a handle is one update cycle: if any effect, branch or
//! item it re-runs fails, the write returns that error.

use std::sync::Arc;

use crate::flow::{For, Show};
use crate::reactive::{catch_failures, on_cleanup, report_failure, Effect, Owner, ReadSignal, Signal};

use super::context::Context;
use super::error::RuleError;
use super::expr::Expr;
use super::interpreter::{Arg, Interpreter, Thunk};
use super::value::{Function, Value};

/// Wrap a signal as a reader function with a writer.
///
/// Writing a function applies it as an updater to the current value.
pub(crate) fn signal_handle(signal: Signal<Value>) -> Value {
    let reader = signal.clone();
    Function::new(move |_| Ok(reader.get()))
        .with_writer(move |next| {
            let next = match next {
                Value::Function(updater) => updater.call(&[signal.get_untracked()])?,
                value => value,
            };
            let (_, failure) = catch_failures(|| signal.set(next.clone()));
            match failure {
                Some(failure) => Err(RuleError::from_failure(failure)),
                None => Ok(next),
            }
        })
        .into()
}

fn first_value(args: Vec<Arg>) -> Result<(Value, std::vec::IntoIter<Arg>), RuleError> {
    let mut args = args.into_iter();
    let first = args.next().map(Arg::force).transpose()?.unwrap_or_default();
    Ok((first, args))
}

fn index_reader(index: ReadSignal<usize>) -> Value {
    Function::new(move |_| Ok(Value::from(index.get()))).into()
}

fn run_body(body: Option<&Thunk>) -> Result<Value, RuleError> {
    match body {
        Some(thunk) => thunk.run(),
        None => Ok(Value::Null),
    }
}

impl Interpreter {
    pub(super) fn state(args: Vec<Arg>) -> Result<Value, RuleError> {
        let (initial, _) = first_value(args)?;
        Ok(signal_handle(Signal::new(initial)))
    }

    pub(super) fn global(&self, args: Vec<Arg>) -> Result<Value, RuleError> {
        let (key, mut rest) = first_value(args)?;
        let key = match key {
            Value::String(key) => key,
            other => {
                return Err(RuleError::invalid("$global", format!("key must be a string, got {other}")));
            }
        };
        let initial = rest.next().map(Arg::force).transpose()?;
        let signal = self.registry.signal::<Value>(&key, initial)?;
        Ok(signal_handle(signal))
    }

    pub(super) fn set(args: Vec<Arg>) -> Result<Value, RuleError> {
        let (target, mut rest) = first_value(args)?;
        let value = rest.next().map(Arg::force).transpose()?.unwrap_or_default();
        match target.as_function().and_then(|f| f.write(value)) {
            Some(written) => written,
            None => {
                tracing::warn!(%target, "$set target has no writer");
                Ok(Value::Null)
            }
        }
    }

    pub(super) fn effect(&self, args: Vec<Arg>) -> Result<Value, RuleError> {
        let Some(body) = self.deferred("$effect", 0, args.into_iter().next())? else {
            return Ok(Value::Null);
        };
        if Owner::current().is_none() {
            tracing::warn!("$effect evaluated outside of any owner; it stops when this call returns");
        }
        let effect = Effect::try_new(move || body.run().map(drop))?;
        tracing::trace!(effect = %effect.id(), "rule effect created");
        Ok(Value::Null)
    }

    pub(super) fn cleanup(&self, args: Vec<Arg>) -> Result<Value, RuleError> {
        let Some(body) = self.deferred("$cleanup", 0, args.into_iter().next())? else {
            return Ok(Value::Null);
        };
        on_cleanup(move || {
            if let Err(error) = body.run() {
                report_failure(error);
            }
        });
        Ok(Value::Null)
    }

    fn branch_body(&self, operator: &str, position: usize, expr: Option<&Expr>, context: &Context) -> Result<Option<Thunk>, RuleError> {
        let arg = expr.map(|expr| self.arg(expr, context)).transpose()?;
        self.deferred(operator, position, arg)
    }

    pub(super) fn show(&self, args: &[Expr], context: &Context) -> Result<Value, RuleError> {
        let when = Arc::new(args.first().cloned().unwrap_or(Expr::Literal(Value::Null)));
        let on_true = self.branch_body("$show", 1, args.get(1), context)?;
        let on_false = match args.get(2) {
            Some(expr) => Some(self.branch_body("$show", 2, Some(expr), context)?),
            None => None,
        };

        let condition = {
            let (interpreter, context) = (self.clone(), context.clone());
            move || interpreter.evaluate(&when, &context)
        };
        let on_true = move |_: Value| run_body(on_true.as_ref());

        let show = match on_false {
            Some(on_false) => Show::try_with_fallback(condition, on_true, move || run_body(on_false.as_ref()))?,
            None => Show::try_new(condition, on_true)?,
        };
        Ok(Function::new(move |_| Ok(show.value().unwrap_or_default())).into())
    }

    pub(super) fn each(&self, args: &[Expr], context: &Context) -> Result<Value, RuleError> {
        let list = Arc::new(args.first().cloned().unwrap_or(Expr::Array(Vec::new())));
        let child = self.branch_body("$for", 1, args.get(1), context)?;

        let items = {
            let (interpreter, context) = (self.clone(), context.clone());
            move || -> Result<Vec<Value>, RuleError> {
                match interpreter.evaluate(&list, &context)? {
                    Value::Array(items) => Ok(items),
                    Value::Null => Ok(Vec::new()),
                    other => Err(RuleError::invalid("$for", format!("expected an array, got {other}"))),
                }
            }
        };
        let build = move |item: &Value, index: ReadSignal<usize>| {
            let Some(thunk) = child.as_ref() else {
                return Ok(Value::Null);
            };
            let scope = thunk
                .context()
                .extend_many([("item", item.clone()), ("index", index_reader(index))]);
            thunk.run_in(&scope)
        };

        let rows = For::try_new(items, build)?;
        Ok(Function::new(move |_| Ok(Value::Array(rows.values()))).into())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
