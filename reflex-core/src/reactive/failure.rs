//! Update Cycle Failures
//!
//! A computation that re-runs because a signal changed has no caller of its
//! own to return an error to. Instead it reports the error here, and the
//! write that started the cycle picks it up.
//!
//! # How It Works
//!
//! 1. A writer wraps its write in [`catch_failures`], which pushes a frame
//!    on a thread-local stack.
//!
//! 2. Any computation that fails while the frame is active calls
//!    [`report_failure`]. The first failure in the frame is kept; later ones
//!    are traced.
//!
//! 3. When the write returns, the frame is popped and the kept failure is
//!    handed back to the writer.
//!
//! With no frame active a failure is traced with `tracing::error!`, since
//! nothing else would ever see it.

use std::cell::RefCell;
use std::error::Error;
use std::sync::Arc;

use parking_lot::Mutex;

/// An error raised by a computation during an update cycle.
pub type Failure = Box<dyn Error + Send + Sync>;

thread_local! {
    static FAILURE_STACK: RefCell<Vec<Option<Failure>>> = const { RefCell::new(Vec::new()) };
}

/// Pops its frame when dropped.
struct FailureFrame;

impl FailureFrame {
    fn push() -> Self {
        FAILURE_STACK.with(|stack| stack.borrow_mut().push(None));
        FailureFrame
    }

    fn take(&self) -> Option<Failure> {
        FAILURE_STACK.with(|stack| stack.borrow_mut().last_mut().and_then(Option::take))
    }
}

impl Drop for FailureFrame {
    fn drop(&mut self) {
        FAILURE_STACK.with(|stack| stack.borrow_mut().pop());
    }
}

/// Run `f` and return the first failure any computation reported meanwhile.
///
/// Frames nest: a failure is only seen by the innermost active frame.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::{catch_failures, Effect, Signal};
///
/// let count = Signal::new(0);
/// let _effect = Effect::try_new({
///     let count = count.clone();
///     move || match count.get() {
///         0 => Ok(()),
///         n => Err(format!("cannot handle {n}")),
///     }
/// })
/// .unwrap();
///
/// let (_, failure) = catch_failures(|| count.set(3));
/// assert_eq!(failure.unwrap().to_string(), "cannot handle 3");
/// ```
pub fn catch_failures<R>(f: impl FnOnce() -> R) -> (R, Option<Failure>) {
    let frame = FailureFrame::push();
    let result = f();
    let failure = frame.take();
    (result, failure)
}

/// Hand a failure to the innermost [`catch_failures`] frame.
pub fn report_failure(error: impl Into<Failure>) {
    let error = error.into();
    let unclaimed = FAILURE_STACK.with(|stack| match stack.borrow_mut().last_mut() {
        Some(slot) if slot.is_none() => {
            *slot = Some(error);
            None
        }
        Some(_) => {
            tracing::warn!(%error, "further failure in the same update cycle");
            None
        }
        None => Some(error),
    });
    if let Some(error) = unclaimed {
        tracing::error!(%error, "computation failed outside of any write");
    }
}

/// Routes the errors of a fallible computation.
///
/// While the computation is being constructed the first error is kept for
/// the constructor to return. After [`FirstRunErrors::finish`] every error
/// goes to [`report_failure`].
pub(crate) struct FirstRunErrors<E> {
    state: Arc<Mutex<(bool, Option<E>)>>,
}

impl<E> FirstRunErrors<E>
where
    E: Into<Failure>,
{
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new((true, None))),
        }
    }

    pub(crate) fn fail(&self, error: E) {
        let mut state = self.state.lock();
        let (constructing, first) = &mut *state;
        if !*constructing {
            drop(state);
            report_failure(error);
        } else if first.is_none() {
            *first = Some(error);
        }
    }

    /// End construction and return the first error it raised.
    pub(crate) fn finish(&self) -> Option<E> {
        let mut state = self.state.lock();
        state.0 = false;
        state.1.take()
    }
}

impl<E> Clone for FirstRunErrors<E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_keeps_the_first_failure() {
        let (value, failure) = catch_failures(|| {
            report_failure("first");
            report_failure("second");
            7
        });
        assert_eq!(value, 7);
        assert_eq!(failure.map(|f| f.to_string()).as_deref(), Some("first"));
    }

    #[test]
    fn inner_frame_hides_failures_from_outer() {
        let (inner, outer) = catch_failures(|| {
            let ((), inner) = catch_failures(|| report_failure("inner"));
            inner
        });
        assert!(inner.is_some());
        assert!(outer.is_none());
    }

    #[test]
    fn no_frame_means_nothing_to_catch() {
        report_failure("nobody listening");
        let ((), failure) = catch_failures(|| ());
        assert!(failure.is_none());
    }

    #[test]
    fn first_run_errors_switch_to_reporting() {
        let errors: FirstRunErrors<String> = FirstRunErrors::new();
        errors.fail("during construction".to_string());
        assert_eq!(errors.finish().as_deref(), Some("during construction"));

        let ((), failure) = catch_failures(|| errors.fail("later".to_string()));
        assert_eq!(failure.map(|f| f.to_string()).as_deref(), Some("later"));
        assert!(errors.finish().is_none());
    }
}
