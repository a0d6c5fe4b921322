//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a running computation, the signal adds
//!    that computation's id to its subscriber list.
//!
//! 2. When a signal is written, its `equals` function decides whether the
//!    value actually changed. Equal writes are dropped on the floor.
//!
//! 3. On a real change, every subscriber re-runs synchronously, in the order
//!    it first subscribed, before `set` returns.
//!
//! # Locking
//!
//! The value lives behind a `parking_lot::RwLock`, but no lock is held while
//! subscribers run, so computations are free to read and write any signal,
//! including the one that triggered them.

use std::fmt::{self, Debug};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::{ComputationId, SignalId, Source};

type EqualsFn<T> = dyn Fn(&T, &T) -> bool + Send + Sync;

struct SignalInner<T> {
    id: SignalId,
    value: RwLock<T>,
    subscribers: Mutex<IndexSet<ComputationId>>,
    equals: Box<EqualsFn<T>>,
}

impl<T> Source for SignalInner<T>
where
    T: Send + Sync + 'static,
{
    fn source_id(&self) -> SignalId {
        self.id
    }

    fn unsubscribe(&self, subscriber: ComputationId) {
        self.subscribers.lock().shift_remove(&subscriber);
    }
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal produces another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T>
where
    T: Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Create a new signal that skips writes equal to the current value.
    pub fn new(value: T) -> Self {
        Self::with_equals(value, |a, b| a == b)
    }
}

impl<T> Signal<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new signal with a custom equality check.
    ///
    /// Pass `|_, _| false` to notify on every write.
    pub fn with_equals<F>(value: T, equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::new(),
                value: RwLock::new(value),
                subscribers: Mutex::new(IndexSet::new()),
                equals: Box::new(equals),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Borrow the current value without cloning it.
    ///
    /// Tracked like `get`. The value is read-locked while `f` runs, so `f`
    /// must not write to this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.read())
    }

    /// Subscribe the running computation, if there is one.
    fn track(&self) {
        if !ReactiveContext::is_active() {
            return;
        }
        let source: Arc<dyn Source> = self.inner.clone();
        if let Some(subscriber) = ReactiveContext::track(source) {
            self.inner.subscribers.lock().insert(subscriber);
        }
    }

    /// Set a new value and re-run subscribers if it changed.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        let changed = {
            let mut guard = self.inner.value.write();
            if (self.inner.equals)(&guard, &value) {
                false
            } else {
                *guard = value;
                true
            }
        };

        if changed {
            self.notify_subscribers();
        }
        changed
    }

    fn notify_subscribers(&self) {
        let subscribers: SmallVec<[ComputationId; 8]> =
            self.inner.subscribers.lock().iter().copied().collect();
        tracing::trace!(signal = %self.inner.id, subscribers = subscribers.len(), "signal changed");
        Runtime::notify(&subscribers);
    }

    /// Get the number of computations currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// A read-only view of this signal.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the current value.
    ///
    /// Inside a running computation this also subscribes the computation.
    pub fn get(&self) -> T {
        self.track();
        self.get_untracked()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Update the value using a function of the previous value.
    ///
    /// The previous value is read untracked, so calling this inside a
    /// computation does not subscribe it.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let prev = self.get_untracked();
        self.set(f(&prev))
    }
}

impl<T> Clone for Signal<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Signal<T>
where
    T: Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Debug for Signal<T>
where
    T: Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A read-only handle to a [`Signal`].
pub struct ReadSignal<T>
where
    T: Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the current value, subscribing the running computation.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }
}

impl<T> ReadSignal<T>
where
    T: Send + Sync + 'static,
{
    /// Get the underlying signal's ID.
    pub fn id(&self) -> SignalId {
        self.signal.id()
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> Debug for ReadSignal<T>
where
    T: Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.signal).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
