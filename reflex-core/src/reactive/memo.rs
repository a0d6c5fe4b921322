//! Memo Implementation
//!
//! A Memo is a derived value that other computations can depend on.
//!
//! # How Memos Work
//!
//! 1. On creation, the memo runs its function (tracked) and stores the
//!    result in an internal signal.
//!
//! 2. When one of its sources changes, the memo re-runs like any other
//!    computation and writes the new result into that signal.
//!
//! 3. The signal's equality check means dependents only re-run when the
//!    derived value actually changed, not every time an input did.
//!
//! Memos are eager: there is no dirty state to inspect, because every change
//! has already been propagated by the time the writer regains control.

use std::fmt::{self, Debug};
use std::sync::{Arc, OnceLock};

use super::effect::Computation;
use super::owner::Owner;
use super::signal::Signal;
use super::subscriber::SignalId;

/// A cached derived value that other computations can subscribe to.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let doubled = Memo::new({
///     let count = count.clone();
///     move |_| count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    signal: Signal<T>,
    computation: Computation<()>,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a memo and compute its first value.
    ///
    /// The function receives the previous value (`None` the first time).
    pub fn new<F>(mut compute: F) -> Self
    where
        F: FnMut(Option<&T>) -> T + Send + 'static,
    {
        let slot: Arc<OnceLock<Signal<T>>> = Arc::new(OnceLock::new());
        let computation = Computation::new({
            let slot = slot.clone();
            move |_: Option<&()>| match slot.get() {
                Some(signal) => {
                    let prev = signal.get_untracked();
                    signal.set(compute(Some(&prev)));
                }
                None => {
                    let first = compute(None);
                    let _ = slot.set(Signal::new(first));
                }
            }
        });

        let signal = slot
            .get()
            .cloned()
            .expect("memo computation runs once on creation");
        Self {
            signal,
            computation,
        }
    }

    /// Get the current value, subscribing the running computation.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    /// The id of the signal holding the memo's value.
    pub fn id(&self) -> SignalId {
        self.signal.id()
    }

    /// Number of times the memo has recomputed.
    pub fn run_count(&self) -> usize {
        self.computation.run_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.computation.dispose();
    }

    /// Whether the memo has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.computation.is_disposed()
    }

    /// The scope the memo's computation runs in.
    pub fn owner(&self) -> Owner {
        self.computation.owner()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            computation: self.computation.clone(),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.get_untracked())
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
