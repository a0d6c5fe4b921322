//! Interpreter configuration.

use serde::{Deserialize, Serialize};

use super::error::RuleError;

/// Knobs for [`Interpreter`](super::Interpreter).
///
/// Every field has a default, so a partial JSON document is accepted:
///
/// ```rust
/// use reflex_core::rules::InterpreterConfig;
///
/// let config = InterpreterConfig::from_json_str(r#"{ "strict_lazy": true }"#).unwrap();
/// assert_eq!(config.lazy_tag, "lazy");
/// assert!(config.strict_lazy);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Key marking a lazy node: `{ <lazy_tag>: true, "rule": ... }`.
    pub lazy_tag: String,

    /// Fail with `ExpectedLazy` instead of degrading to a no-op when a
    /// deferred body is given as an eager expression.
    pub strict_lazy: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            lazy_tag: "lazy".to_string(),
            strict_lazy: false,
        }
    }
}

impl InterpreterConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(source: &str) -> Result<Self, RuleError> {
        let config: InterpreterConfig =
            serde_json::from_str(source).map_err(|e| RuleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), RuleError> {
        if self.lazy_tag.is_empty() {
            return Err(RuleError::Config("lazy_tag must not be empty".into()));
        }
        if self.lazy_tag == "rule" {
            return Err(RuleError::Config("lazy_tag must differ from `rule`".into()));
        }
        Ok(())
    }
}
