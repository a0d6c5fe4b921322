//! Global Signal Registry
//!
//! Named signals whose lifetime is independent of any owner scope. A key
//! maps to at most one signal: the first request that supplies an initial
//! value creates it, and every later request returns the same signal,
//! whatever initial value it passes.
//!
//! [`GlobalRegistry::reset`] clears the mapping. Handles obtained before the
//! reset keep pointing at the old signals, which are no longer reachable by
//! key; a fresh request after the reset creates a new, unrelated signal.
//! This is how the registry is meant to be isolated between tests, and it is
//! also the sharp edge to be aware of when sharing handles.

use std::any::{type_name, Any};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use thiserror::Error;

use super::signal::Signal;

/// Errors raised by registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The key was never registered and no initial value was supplied.
    #[error("global signal `{key}` is not registered and no initial value was given")]
    Missing { key: String },

    /// The key holds a signal of a different value type.
    #[error("global signal `{key}` does not hold a value of type `{expected}`")]
    TypeMismatch { key: String, expected: &'static str },
}

/// A key to signal map.
#[derive(Default)]
pub struct GlobalRegistry {
    signals: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl GlobalRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn shared() -> Arc<GlobalRegistry> {
        static SHARED: OnceLock<Arc<GlobalRegistry>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(GlobalRegistry::new())).clone()
    }

    /// Get the signal registered under `key`, creating it from `initial` if
    /// it does not exist yet.
    pub fn signal<T>(&self, key: &str, initial: Option<T>) -> Result<Signal<T>, RegistryError>
    where
        T: PartialEq + Send + Sync + 'static,
    {
        if let Some(existing) = self.signals.get(key) {
            return Self::downcast(key, existing.value());
        }

        let Some(initial) = initial else {
            return Err(RegistryError::Missing {
                key: key.to_string(),
            });
        };

        let entry = self
            .signals
            .entry(key.to_string())
            .or_insert_with(|| {
                tracing::debug!(key, "registering global signal");
                Arc::new(Signal::new(initial))
            });
        Self::downcast(key, entry.value())
    }

    fn downcast<T>(key: &str, stored: &Arc<dyn Any + Send + Sync>) -> Result<Signal<T>, RegistryError>
    where
        T: Send + Sync + 'static,
    {
        stored
            .as_ref()
            .downcast_ref::<Signal<T>>()
            .cloned()
            .ok_or_else(|| RegistryError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Whether `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.signals.contains_key(key)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Forget every registered signal.
    pub fn reset(&self) {
        tracing::debug!(count = self.signals.len(), "resetting global registry");
        self.signals.clear();
    }
}

impl std::fmt::Debug for GlobalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// Look up (or create) a signal in the process-wide registry.
pub fn global<T>(key: &str, initial: Option<T>) -> Result<Signal<T>, RegistryError>
where
    T: PartialEq + Send + Sync + 'static,
{
    GlobalRegistry::shared().signal(key, initial)
}

/// Clear the process-wide registry.
pub fn reset_globals() {
    GlobalRegistry::shared().reset();
}
