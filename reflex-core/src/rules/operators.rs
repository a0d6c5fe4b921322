//! JsonLogic base operators.
//!
//! These act on already-evaluated arguments. The operators that must see
//! their arguments unevaluated (`if`, `and`, `or`, `def` and the reactive
//! ones) live in the interpreter.

use std::cmp::Ordering;

use super::error::RuleError;
use super::value::Value;

/// Operators implemented here.
pub(crate) const BASE_OPERATORS: &[&str] = &[
    "==", "===", "!=", "!==", "!", "!!", "<", "<=", ">", ">=", "+", "-", "*", "/", "%", "min",
    "max", "cat", "in", "merge", "log",
];

/// Apply the base operator `name`, or `None` if it is not one.
pub(crate) fn apply(name: &str, args: &[Value]) -> Option<Result<Value, RuleError>> {
    let arg = |i: usize| args.get(i).unwrap_or(&Value::Null);

    let value = match name {
        "==" => Value::Bool(loose_eq(arg(0), arg(1))),
        "!=" => Value::Bool(!loose_eq(arg(0), arg(1))),
        "===" => Value::Bool(arg(0) == arg(1)),
        "!==" => Value::Bool(arg(0) != arg(1)),
        "!" => Value::Bool(!arg(0).is_truthy()),
        "!!" => Value::Bool(arg(0).is_truthy()),
        "<" => Value::Bool(chain(args, |o| o == Ordering::Less)),
        "<=" => Value::Bool(chain(args, |o| o != Ordering::Greater)),
        ">" => Value::Bool(compare(arg(0), arg(1)) == Some(Ordering::Greater)),
        ">=" => Value::Bool(matches!(
            compare(arg(0), arg(1)),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        "+" => Value::Number(args.iter().map(Value::to_number).sum()),
        "*" => Value::Number(args.iter().map(Value::to_number).product()),
        "-" => match args {
            [single] => Value::Number(-single.to_number()),
            _ => Value::Number(arg(0).to_number() - arg(1).to_number()),
        },
        "/" => Value::Number(arg(0).to_number() / arg(1).to_number()),
        "%" => Value::Number(arg(0).to_number() % arg(1).to_number()),
        "min" => extremum(args, f64::min),
        "max" => extremum(args, f64::max),
        "cat" => Value::String(args.iter().map(Value::to_display_string).collect()),
        "in" => Value::Bool(contains(arg(1), arg(0))),
        "merge" => Value::Array(
            args.iter()
                .flat_map(|a| match a {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                })
                .collect(),
        ),
        "log" => {
            let value = arg(0).clone();
            tracing::info!(%value, "log");
            value
        }
        _ => return None,
    };
    Some(Ok(value))
}

/// `==` with JsonLogic's type coercion.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(_) | Value::Bool(_) | Value::String(_), Value::Number(_) | Value::Bool(_) | Value::String(_)) => {
            a.to_number() == b.to_number()
        }
        _ => a == b,
    }
}

/// Strings compare lexically with strings, everything else numerically.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => a.to_number().partial_cmp(&b.to_number()),
    }
}

/// Two-argument comparison, or the three-argument "between" form.
fn chain(args: &[Value], accept: impl Fn(Ordering) -> bool) -> bool {
    if args.len() < 2 {
        return false;
    }
    args.windows(2)
        .take(2)
        .all(|pair| compare(&pair[0], &pair[1]).is_some_and(&accept))
}

fn extremum(args: &[Value], pick: fn(f64, f64) -> f64) -> Value {
    args.iter()
        .map(Value::to_number)
        .reduce(pick)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => s.contains(&needle.to_display_string()),
        Value::Array(items) => items.iter().any(|item| item == needle),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(name: &str, args: serde_json::Value) -> serde_json::Value {
        let Value::Array(args) = Value::from(args) else {
            panic!("arguments must be an array");
        };
        apply(name, &args).expect("known operator").unwrap().to_json()
    }

    #[test]
    fn equality_coerces_loosely() {
        assert_eq!(eval("==", json!([1, "1"])), json!(true));
        assert_eq!(eval("===", json!([1, "1"])), json!(false));
        assert_eq!(eval("==", json!([null, 0])), json!(false));
        assert_eq!(eval("!=", json!([true, 1])), json!(false));
    }

    #[test]
    fn comparisons_and_between() {
        assert_eq!(eval("<", json!([1, 2])), json!(true));
        assert_eq!(eval("<", json!([1, 2, 3])), json!(true));
        assert_eq!(eval("<", json!([1, 1, 3])), json!(false));
        assert_eq!(eval("<=", json!([1, 1, 3])), json!(true));
        assert_eq!(eval(">=", json!(["b", "a"])), json!(true));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("+", json!([1, "2", 3])), json!(6));
        assert_eq!(eval("-", json!([5])), json!(-5));
        assert_eq!(eval("-", json!([5, 2])), json!(3));
        assert_eq!(eval("*", json!([2, 2.5])), json!(5));
        assert_eq!(eval("/", json!([1, 4])), json!(0.25));
        assert_eq!(eval("%", json!([7, 3])), json!(1));
        assert_eq!(eval("max", json!([1, 9, 3])), json!(9));
        assert_eq!(eval("min", json!([])), json!(null));
    }

    #[test]
    fn strings_and_arrays() {
        assert_eq!(eval("cat", json!(["a", 1, true])), json!("a1true"));
        assert_eq!(eval("in", json!(["ell", "hello"])), json!(true));
        assert_eq!(eval("in", json!([2, [1, 2]])), json!(true));
        assert_eq!(eval("merge", json!([[1], 2, [3, 4]])), json!([1, 2, 3, 4]));
    }

    #[test]
    fn negation_uses_truthiness() {
        assert_eq!(eval("!", json!([[]])), json!(true));
        assert_eq!(eval("!!", json!(["0"])), json!(true));
    }

    #[test]
    fn unknown_names_fall_through() {
        assert!(apply("$state", &[]).is_none());
    }
}
