//! Compiled rule expressions.
//!
//! Decoding a document once up front means the evaluator never has to
//! re-inspect JSON objects to decide whether they are operations, lazy nodes
//! or plain data.

use std::sync::Arc;

use super::value::Value;

/// A compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Data, returned as-is.
    Literal(Value),
    /// An array whose elements are evaluated in order.
    Array(Vec<Expr>),
    /// An operator applied to its argument expressions.
    Op { name: String, args: Vec<Expr> },
    /// A deferred body. Operators receive it unevaluated.
    Lazy(Arc<Expr>),
}

impl Expr {
    /// The operator name, if this is an operation.
    pub fn operator(&self) -> Option<&str> {
        match self {
            Expr::Op { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether this is a lazy node.
    pub fn is_lazy(&self) -> bool {
        matches!(self, Expr::Lazy(_))
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

/// Decodes JSON documents into [`Expr`] trees.
pub(crate) struct Compiler<'a> {
    pub(crate) lazy_tag: &'a str,
    pub(crate) is_operator: &'a dyn Fn(&str) -> bool,
}

impl Compiler<'_> {
    pub(crate) fn compile(&self, json: &serde_json::Value) -> Expr {
        match json {
            serde_json::Value::Array(items) => {
                Expr::Array(items.iter().map(|item| self.compile(item)).collect())
            }
            serde_json::Value::Object(map) => {
                if let Some(rule) = self.lazy_rule(map) {
                    return Expr::Lazy(Arc::new(self.compile(rule)));
                }
                match map.iter().next() {
                    Some((name, args)) if map.len() == 1 && (self.is_operator)(name) => Expr::Op {
                        name: name.clone(),
                        args: self.compile_args(args),
                    },
                    _ => Expr::Literal(Value::from(json)),
                }
            }
            scalar => Expr::Literal(Value::from(scalar)),
        }
    }

    /// `{ <tag>: true, "rule": r }` with no other keys.
    fn lazy_rule<'j>(
        &self,
        map: &'j serde_json::Map<String, serde_json::Value>,
    ) -> Option<&'j serde_json::Value> {
        if map.len() != 2 || map.get(self.lazy_tag) != Some(&serde_json::Value::Bool(true)) {
            return None;
        }
        map.get("rule")
    }

    /// A single non-array argument is shorthand for a one-element list.
    fn compile_args(&self, args: &serde_json::Value) -> Vec<Expr> {
        match args {
            serde_json::Value::Array(items) => items.iter().map(|item| self.compile(item)).collect(),
            other => vec![self.compile(other)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(json: serde_json::Value) -> Expr {
        let is_operator = |name: &str| matches!(name, "var" | "+" | "$effect");
        Compiler {
            lazy_tag: "lazy",
            is_operator: &is_operator,
        }
        .compile(&json)
    }

    #[test]
    fn single_known_key_is_an_operation() {
        assert_eq!(
            compile(json!({"+": [1, {"var": "x"}]})),
            Expr::Op {
                name: "+".into(),
                args: vec![
                    Expr::Literal(Value::from(1)),
                    Expr::Op {
                        name: "var".into(),
                        args: vec![Expr::Literal(Value::from("x"))],
                    },
                ],
            }
        );
    }

    #[test]
    fn unknown_keys_are_literal_objects() {
        let expr = compile(json!({"name": {"var": "x"}}));
        assert_eq!(expr, Expr::Literal(Value::from(json!({"name": {"var": "x"}}))));
    }

    #[test]
    fn lazy_node_needs_exactly_tag_and_rule() {
        assert!(compile(json!({"lazy": true, "rule": 1})).is_lazy());
        assert!(!compile(json!({"lazy": false, "rule": 1})).is_lazy());
        assert!(!compile(json!({"lazy": true, "rule": 1, "extra": 0})).is_lazy());
    }

    #[test]
    fn lazy_bodies_inside_operations() {
        let expr = compile(json!({"$effect": {"lazy": true, "rule": {"var": "x"}}}));
        let Expr::Op { name, args } = expr else {
            panic!("expected an operation");
        };
        assert_eq!(name, "$effect");
        assert!(args[0].is_lazy());
    }

    #[test]
    fn arrays_compile_elementwise() {
        let expr = compile(json!([1, {"var": "a"}]));
        let Expr::Array(items) = expr else {
            panic!("expected an array");
        };
        assert_eq!(items[1].operator(), Some("var"));
    }
}
