use thiserror::Error;

use crate::reactive::{Failure, RegistryError};

/// Errors raised while compiling or evaluating rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A deferred body was required but an eager expression was given.
    /// Only raised in strict lazy mode.
    #[error("`{operator}` expects a lazy node at argument {position}")]
    ExpectedLazy { operator: String, position: usize },

    #[error("`{operator}`: {message}")]
    InvalidArgument { operator: String, message: String },

    /// A host function reported a failure.
    #[error("host function failed: {0}")]
    Host(String),

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid MessagePack document: {0}")]
    MsgPack(#[from] rmp_serde::decode::Error),

    #[error("invalid interpreter configuration: {0}")]
    Config(String),
}

impl RuleError {
    pub(crate) fn invalid(operator: &str, message: impl Into<String>) -> Self {
        RuleError::InvalidArgument {
            operator: operator.to_string(),
            message: message.into(),
        }
    }

    /// Recover a rule error from an update-cycle failure.
    ///
    /// Failures raised by rules come back as they were; anything else is
    /// wrapped as a host error.
    pub fn from_failure(failure: Failure) -> Self {
        match failure.downcast::<RuleError>() {
            Ok(error) => *error,
            Err(other) => RuleError::Host(other.to_string()),
        }
    }

    /// Convenience for host functions.
    pub fn host(message: impl std::fmt::Display) -> Self {
        RuleError::Host(message.to_string())
    }
}
