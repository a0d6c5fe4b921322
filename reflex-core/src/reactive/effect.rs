//! Computation and Effect Implementation
//!
//! A computation is a function that re-runs whenever a signal it read on its
//! last run changes. An effect is a computation whose result is `()`.
//!
//! # How Computations Work
//!
//! 1. When created, the computation runs its function immediately to
//!    establish initial dependencies. There is no lazy first run.
//!
//! 2. When any dependency changes, the computation re-runs synchronously,
//!    inside the write that changed it.
//!
//! 3. Each run collects a fresh set of sources. Sources read last time but
//!    not this time are unsubscribed, so stale dependencies never fire.
//!
//! 4. A computation never runs inside itself. A write that would re-trigger
//!    it during its own run marks it pending, and it runs again as soon as
//!    the current run returns.
//!
//! # Ownership
//!
//! Each computation gets its own scope, a child of whatever owner was
//! current when it was created. Anything created during a run (nested
//! effects, cleanups, combinator scopes) belongs to that scope and is
//! disposed before the next run. Disposing the parent disposes the
//! computation. A computation created with no current owner, or under one
//! that is already disposed, lives as long as its handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{source_ids, ReactiveContext, Sources};
use super::failure::{Failure, FirstRunErrors};
use super::owner::Owner;
use super::runtime::{Reactive, Runtime};
use super::subscriber::ComputationId;

type ComputeFn<T> = dyn FnMut(Option<&T>) -> T + Send;

struct ComputationInner<T> {
    id: ComputationId,
    scope: Owner,
    compute: Mutex<Box<ComputeFn<T>>>,
    value: Mutex<Option<T>>,
    sources: Mutex<Sources>,
    running: AtomicBool,
    pending: AtomicBool,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl<T> ComputationInner<T>
where
    T: Clone + Send + 'static,
{
    /// Run the function once inside this computation's scope and tracking
    /// frame, then swap in the new dependency set.
    fn execute(&self) {
        self.scope.reset();

        let prev = self.value.lock().clone();
        let frame = ReactiveContext::enter(self.id);
        let next = self.scope.run(|| {
            let mut compute = self.compute.lock();
            (compute.as_mut())(prev.as_ref())
        });
        let sources = frame.finish();

        let fresh = source_ids(&sources);
        let stale = std::mem::replace(&mut *self.sources.lock(), sources);
        for source in stale.iter() {
            if !fresh.contains(&source.source_id()) {
                source.unsubscribe(self.id);
            }
        }

        *self.value.lock() = Some(next);
        self.run_count.fetch_add(1, Ordering::SeqCst);

        // Disposed from inside its own run: drop whatever this run subscribed.
        if self.disposed.load(Ordering::SeqCst) {
            self.drop_sources();
        }
    }

    fn drop_sources(&self) {
        let sources = std::mem::take(&mut *self.sources.lock());
        for source in sources.iter() {
            source.unsubscribe(self.id);
        }
    }
}

/// Clears the running flag even if the computation panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<T> Reactive for ComputationInner<T>
where
    T: Clone + Send + 'static,
{
    fn subscriber_id(&self) -> ComputationId {
        self.id
    }

    fn schedule(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::trace!(computation = %self.id, "re-run deferred until current run completes");
            self.pending.store(true, Ordering::SeqCst);
            return;
        }

        let _running = RunningGuard(&self.running);
        loop {
            self.pending.store(false, Ordering::SeqCst);
            tracing::trace!(computation = %self.id, "running computation");
            self.execute();
            if !self.pending.load(Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(computation = %self.id, "disposing computation");
        self.drop_sources();
        Runtime::unregister(self.id);
        self.scope.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<T> Drop for ComputationInner<T> {
    fn drop(&mut self) {
        let sources = std::mem::take(self.sources.get_mut());
        for source in sources.iter() {
            source.unsubscribe(self.id);
        }
        Runtime::unregister(self.id);
        self.scope.dispose();
    }
}

/// A re-runnable unit of work with automatic dependency tracking.
///
/// The function receives the value returned by its previous run (`None` on
/// the first run).
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::{Computation, Signal};
///
/// let count = Signal::new(1);
/// let total = Computation::new({
///     let count = count.clone();
///     move |prev: Option<&i32>| prev.copied().unwrap_or(0) + count.get()
/// });
///
/// assert_eq!(total.value(), Some(1));
/// count.set(2);
/// assert_eq!(total.value(), Some(3));
/// ```
pub struct Computation<T>
where
    T: Clone + Send + 'static,
{
    inner: Arc<ComputationInner<T>>,
}

impl<T> Computation<T>
where
    T: Clone + Send + 'static,
{
    /// Create a computation and run it once.
    ///
    /// A panic in the first run propagates to the caller.
    pub fn new<F>(compute: F) -> Self
    where
        F: FnMut(Option<&T>) -> T + Send + 'static,
    {
        let parent = Owner::current();
        let scope = match &parent {
            Some(parent) => parent.child(),
            None => Owner::new_root(),
        };

        let inner = Arc::new(ComputationInner {
            id: ComputationId::new(),
            scope: scope.clone(),
            compute: Mutex::new(Box::new(compute)),
            value: Mutex::new(None),
            sources: Mutex::new(Sources::new()),
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });

        let reactive: Arc<dyn Reactive> = inner.clone();
        Runtime::register(&reactive);
        if parent.as_ref().is_some_and(|parent| !parent.is_disposed()) {
            scope.adopt(reactive);
        } else {
            tracing::debug!(computation = %inner.id, "computation created outside of a live owner; its handle controls its lifetime");
        }

        inner.schedule();
        Self { inner }
    }

    /// Get the computation's id.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// The value returned by the most recent run.
    ///
    /// Reading this does not subscribe anything; use a [`Memo`](super::Memo)
    /// for a derived value other computations can depend on.
    pub fn value(&self) -> Option<T> {
        self.inner.value.lock().clone()
    }

    /// Re-run the computation now, as if a dependency had changed.
    pub fn execute(&self) {
        self.inner.schedule();
    }

    /// Stop the computation and dispose everything its runs created.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Whether the computation has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Number of times the computation has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of sources read on the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.lock().len()
    }

    /// The scope each run executes in.
    pub fn owner(&self) -> Owner {
        self.inner.scope.clone()
    }
}

impl<T> Clone for Computation<T>
where
    T: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Computation<T>
where
    T: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct Effect {
    computation: Computation<()>,
}

impl Effect {
    /// Create an effect and run it once.
    pub fn new<F>(mut run: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self {
            computation: Computation::new(move |_: Option<&()>| run()),
        }
    }

    /// Create an effect whose body can fail.
    ///
    /// An error on the first run disposes the effect and is returned to the
    /// caller. Errors on later runs are reported with
    /// [`report_failure`](super::report_failure) to the write that triggered
    /// them; the effect stays live, depending on whatever that failed run
    /// managed to read.
    pub fn try_new<F, E>(mut run: F) -> Result<Self, E>
    where
        F: FnMut() -> Result<(), E> + Send + 'static,
        E: Into<Failure> + Send + 'static,
    {
        let errors = FirstRunErrors::new();
        let effect = Self::new({
            let errors = errors.clone();
            move || {
                if let Err(error) = run() {
                    errors.fail(error);
                }
            }
        });

        match errors.finish() {
            Some(error) => {
                effect.dispose();
                Err(error)
            }
            None => Ok(effect),
        }
    }

    /// Get the effect's id.
    pub fn id(&self) -> ComputationId {
        self.computation.id()
    }

    /// Re-run the effect now.
    pub fn execute(&self) {
        self.computation.execute();
    }

    /// Dispose of the effect. After disposal it never runs again.
    pub fn dispose(&self) {
        self.computation.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.computation.is_disposed()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.computation.run_count()
    }

    /// Get the number of dependencies from the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.computation.dependency_count()
    }

    /// The scope the effect's runs execute in.
    pub fn owner(&self) -> Owner {
        self.computation.owner()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
