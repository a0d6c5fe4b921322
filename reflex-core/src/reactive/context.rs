//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation is registered as a subscriber and the signal is
//! recorded as one of the computation's sources for this run.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Running a computation pushes a
//! tracking frame; [`untrack`] pushes an opaque frame that hides any outer
//! computation. Frames are popped by a guard, so the stack stays balanced
//! even if the computation panics.

use std::cell::RefCell;
use std::sync::Arc;

use smallvec::SmallVec;

use super::subscriber::{ComputationId, SignalId, Source};

/// Sources collected during a single run.
pub type Sources = SmallVec<[Arc<dyn Source>; 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// One level of the tracking stack.
enum Frame {
    Tracking {
        subscriber: ComputationId,
        sources: Sources,
    },
    Untracked,
}

/// Guard that pops its frame when dropped.
pub struct ReactiveContext {
    subscriber: Option<ComputationId>,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a tracking frame for the given computation.
    ///
    /// Every signal read until the guard is finished or dropped subscribes
    /// `subscriber`.
    pub fn enter(subscriber: ComputationId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame::Tracking {
                subscriber,
                sources: SmallVec::new(),
            });
        });

        Self {
            subscriber: Some(subscriber),
            finished: false,
        }
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Frame::Untracked));
        Self {
            subscriber: None,
            finished: false,
        }
    }

    /// Check if a computation is currently tracking reads.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the computation tracking reads right now, if any.
    pub fn current_subscriber() -> Option<ComputationId> {
        CONTEXT_STACK.with(|stack| match stack.borrow().last() {
            Some(Frame::Tracking { subscriber, .. }) => Some(*subscriber),
            _ => None,
        })
    }

    /// Record a read of `source` in the innermost tracking frame.
    ///
    /// Returns the subscriber that should be registered with the source, or
    /// `None` when nothing is tracking. Repeated reads of the same source in
    /// one run are recorded once.
    pub fn track(source: Arc<dyn Source>) -> Option<ComputationId> {
        CONTEXT_STACK.with(|stack| match stack.borrow_mut().last_mut() {
            Some(Frame::Tracking {
                subscriber,
                sources,
            }) => {
                let id = source.source_id();
                if !sources.iter().any(|s| s.source_id() == id) {
                    sources.push(source);
                }
                Some(*subscriber)
            }
            _ => None,
        })
    }

    /// Pop this frame and return the sources it collected.
    pub fn finish(mut self) -> Sources {
        self.finished = true;
        Self::pop(self.subscriber)
    }

    fn pop(expected: Option<ComputationId>) -> Sources {
        CONTEXT_STACK.with(|stack| match stack.borrow_mut().pop() {
            Some(Frame::Tracking {
                subscriber,
                sources,
            }) => {
                debug_assert_eq!(
                    Some(subscriber),
                    expected,
                    "ReactiveContext mismatch: expected {expected:?}, got {subscriber:?}"
                );
                sources
            }
            Some(Frame::Untracked) => {
                debug_assert!(expected.is_none(), "ReactiveContext mismatch: expected {expected:?}, got untracked frame");
                SmallVec::new()
            }
            None => SmallVec::new(),
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            Self::pop(self.subscriber);
        }
    }
}

/// Run `f` without tracking any signal reads.
///
/// Branch bodies of the control-flow combinators run this way so that
/// reads inside a branch never subscribe the combinator itself.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _frame = ReactiveContext::untracked();
    f()
}

/// Ids of the sources a set of [`Sources`] refers to.
pub(crate) fn source_ids(sources: &Sources) -> SmallVec<[SignalId; 4]> {
    sources.iter().map(|s| s.source_id()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource(SignalId);

    impl Source for FakeSource {
        fn source_id(&self) -> SignalId {
            self.0
        }

        fn unsubscribe(&self, _subscriber: ComputationId) {}
    }

    fn fake() -> Arc<dyn Source> {
        Arc::new(FakeSource(SignalId::new()))
    }

    #[test]
    fn context_tracks_subscriber() {
        let id = ComputationId::new();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_collects_sources_once() {
        let id = ComputationId::new();
        let ctx = ReactiveContext::enter(id);

        let a = fake();
        let b = fake();
        assert_eq!(ReactiveContext::track(a.clone()), Some(id));
        ReactiveContext::track(b.clone());
        ReactiveContext::track(a.clone());

        let sources = ctx.finish();
        assert_eq!(
            source_ids(&sources).as_slice(),
            &[a.source_id(), b.source_id()]
        );
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn nested_contexts() {
        let id1 = ComputationId::new();
        let id2 = ComputationId::new();

        {
            let _ctx1 = ReactiveContext::enter(id1);
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(id2);
                assert_eq!(ReactiveContext::current_subscriber(), Some(id2));
            }

            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untrack_hides_outer_subscriber() {
        let id = ComputationId::new();
        let _ctx = ReactiveContext::enter(id);

        untrack(|| {
            assert!(!ReactiveContext::is_active());
            assert_eq!(ReactiveContext::track(fake()), None);
        });

        assert_eq!(ReactiveContext::current_subscriber(), Some(id));
    }

    #[test]
    fn frame_is_popped_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter(ComputationId::new());
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!ReactiveContext::is_active());
    }
}
