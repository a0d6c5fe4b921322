//! Execution contexts.
//!
//! A context maps names to values. Extending it never mutates: `extend`
//! returns a new frame layered over the old one, so a binding added for one
//! `def` body or one `$for` item is invisible to siblings and to the parent.
//! Frames are reference counted, which makes capturing a context in a
//! deferred body a pointer copy.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::error::RuleError;
use super::value::Value;

struct Frame {
    bindings: IndexMap<String, Value>,
    parent: Option<Context>,
}

/// An immutable, layered name to value mapping.
#[derive(Clone)]
pub struct Context {
    frame: Arc<Frame>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::from_bindings(IndexMap::new())
    }

    /// A context holding exactly `bindings`.
    pub fn from_bindings(bindings: IndexMap<String, Value>) -> Self {
        Self {
            frame: Arc::new(Frame {
                bindings,
                parent: None,
            }),
        }
    }

    /// Build a context from a JSON object.
    pub fn from_json(json: serde_json::Value) -> Result<Self, RuleError> {
        match Value::from(json) {
            Value::Object(bindings) => Ok(Self::from_bindings(bindings)),
            Value::Null => Ok(Self::new()),
            other => Err(RuleError::invalid(
                "context",
                format!("expected an object, got {other}"),
            )),
        }
    }

    /// Builder used when assembling the initial context.
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extend(name, value)
    }

    /// A new context with `name` bound to `value`, shadowing any outer binding.
    pub fn extend(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut bindings = IndexMap::with_capacity(1);
        bindings.insert(name.into(), value.into());
        self.layer(bindings)
    }

    /// A new context with several bindings added at once.
    pub fn extend_many<I, K>(&self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.layer(bindings.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn layer(&self, bindings: IndexMap<String, Value>) -> Self {
        Self {
            frame: Arc::new(Frame {
                bindings,
                parent: Some(self.clone()),
            }),
        }
    }

    /// The innermost binding of `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let mut frame = &self.frame;
        loop {
            if let Some(value) = frame.bindings.get(name) {
                return Some(value);
            }
            frame = &frame.parent.as_ref()?.frame;
        }
    }

    /// Resolve a dotted path such as `user.tags.0`.
    ///
    /// The first segment names a binding, later segments walk into objects
    /// and arrays. An empty path yields the whole context as an object.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        if path.is_empty() {
            return Some(self.to_value());
        }
        let mut segments = path.split('.');
        let head = segments.next()?;
        let mut current = self.get(head)?;
        for segment in segments {
            current = current.get_segment(segment)?;
        }
        Some(current.clone())
    }

    /// Whether `name` is bound anywhere in the chain.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Flatten the chain into one object, inner bindings winning.
    pub fn to_value(&self) -> Value {
        let mut chain = Vec::new();
        let mut next = Some(self);
        while let Some(ctx) = next {
            chain.push(&ctx.frame.bindings);
            next = ctx.frame.parent.as_ref();
        }
        let mut merged = IndexMap::new();
        for bindings in chain.into_iter().rev() {
            for (name, value) in bindings {
                merged.insert(name.clone(), value.clone());
            }
        }
        Value::Object(merged)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Context").field(&self.to_value()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extension_does_not_touch_the_parent() {
        let base = Context::new().with("x", 1);
        let child = base.extend("x", 2).extend("y", 3);

        assert_eq!(base.get("x"), Some(&Value::from(1)));
        assert!(!base.contains("y"));
        assert_eq!(child.get("x"), Some(&Value::from(2)));
        assert_eq!(child.get("y"), Some(&Value::from(3)));
    }

    #[test]
    fn dotted_lookup_walks_objects_and_arrays() {
        let ctx = Context::from_json(json!({"user": {"tags": ["a", "b"]}})).unwrap();
        assert_eq!(ctx.lookup("user.tags.1"), Some(Value::from("b")));
        assert_eq!(ctx.lookup("user.missing"), None);
        assert_eq!(ctx.lookup("nobody"), None);
    }

    #[test]
    fn flattening_prefers_inner_bindings() {
        let ctx = Context::new().with("a", 1).with("b", 2).extend("a", 10);
        assert_eq!(ctx.to_value().to_json(), json!({"a": 10, "b": 2}));
        assert_eq!(ctx.lookup(""), Some(ctx.to_value()));
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert!(Context::from_json(json!([1, 2])).is_err());
        assert!(Context::from_json(json!(null)).is_ok());
    }
}
