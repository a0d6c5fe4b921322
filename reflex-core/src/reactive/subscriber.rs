//! Identifiers for the two sides of a subscription.
//!
//! A signal is a *source*; a computation is a *subscriber*. Signals keep
//! ordered lists of subscriber ids rather than pointers, and the runtime
//! resolves an id back to its computation when a notification fires.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a computation.
///
/// Ids are allocated from a monotonically increasing counter, so comparing
/// two ids also tells you which computation was created first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComputationId(u64);

impl ComputationId {
    /// Allocate a fresh id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ComputationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u64);

impl SignalId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Anything a computation can depend on.
///
/// The tracking context records sources read during a run; once the run
/// finishes, the computation diffs them against the previous run and calls
/// [`Source::unsubscribe`] on every source it no longer reads.
pub trait Source: Send + Sync {
    /// The source's id, used to deduplicate reads within one run.
    fn source_id(&self) -> SignalId;

    /// Forget the given subscriber.
    fn unsubscribe(&self, subscriber: ComputationId);
}
