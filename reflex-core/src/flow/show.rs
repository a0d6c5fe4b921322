//! `Show`: conditional scopes.
//!
//! One computation reads the condition. Only a change of *side* does any
//! work: moving from a truthy value to another truthy value keeps the live
//! true-branch scope as it is. On a change of side the old branch's scope is
//! disposed (running its cleanups) before the new branch is constructed, so
//! the two branches are never alive at the same time.
//!
//! # Failures
//!
//! The fallible constructors take a condition and branches that return
//! `Result`. A failing condition changes nothing: the live branch stays
//! live. A failing branch body has its scope disposed and leaves no branch
//! active. On the first run either failure aborts construction; afterwards
//! it is reported to the write that triggered the re-run.

use std::convert::Infallible;
use std::fmt;

use crate::reactive::{untrack, Computation, Failure, FirstRunErrors, Owner, Signal};

use super::Truthy;

type TrueFn<T, U, E> = Box<dyn FnMut(T) -> Result<U, E> + Send>;
type FalseFn<U, E> = Box<dyn FnMut() -> Result<U, E> + Send>;

/// Which branch currently owns a scope.
enum Active {
    Idle,
    True(Owner),
    /// `None` when there is no fallback to construct.
    False(Option<Owner>),
}

impl Active {
    fn leave(&mut self) {
        match std::mem::replace(self, Active::Idle) {
            Active::True(scope) | Active::False(Some(scope)) => scope.dispose(),
            Active::False(None) | Active::Idle => {}
        }
    }
}

/// A conditional pair of scopes driven by a reactive condition.
///
/// # Example
///
/// ```rust
/// use reflex_core::flow::Show;
/// use reflex_core::reactive::{create_root, Signal};
///
/// let logged_in = Signal::new(false);
/// let show = create_root(|_| {
///     let logged_in = logged_in.clone();
///     Show::with_fallback(move || logged_in.get(), |_| "welcome", || "sign in")
/// });
///
/// assert_eq!(show.value(), Some("sign in"));
/// logged_in.set(true);
/// assert_eq!(show.value(), Some("welcome"));
/// ```
pub struct Show<U>
where
    U: Clone + Send + Sync + 'static,
{
    container: Owner,
    output: Signal<Option<U>>,
    computation: Computation<()>,
}

impl<U> Show<U>
where
    U: Clone + Send + Sync + 'static,
{
    /// Show `on_true` while `condition` is truthy, nothing otherwise.
    pub fn new<T, C, FT>(condition: C, mut on_true: FT) -> Self
    where
        T: Truthy + 'static,
        C: Fn() -> T + Send + 'static,
        FT: FnMut(T) -> U + Send + 'static,
    {
        let built = Self::build::<T, Infallible, _>(
            move || Ok(condition()),
            Box::new(move |value| Ok(on_true(value))),
            None,
        );
        match built {
            Ok(show) => show,
            Err(never) => match never {},
        }
    }

    /// Show `on_true` while `condition` is truthy and `on_false` otherwise.
    pub fn with_fallback<T, C, FT, FF>(condition: C, mut on_true: FT, mut on_false: FF) -> Self
    where
        T: Truthy + 'static,
        C: Fn() -> T + Send + 'static,
        FT: FnMut(T) -> U + Send + 'static,
        FF: FnMut() -> U + Send + 'static,
    {
        let built = Self::build::<T, Infallible, _>(
            move || Ok(condition()),
            Box::new(move |value| Ok(on_true(value))),
            Some(Box::new(move || Ok(on_false()))),
        );
        match built {
            Ok(show) => show,
            Err(never) => match never {},
        }
    }

    /// Like [`Show::new`], with a fallible condition and branch.
    ///
    /// An error on the first run disposes everything built so far and is
    /// returned.
    pub fn try_new<T, E, C, FT>(condition: C, on_true: FT) -> Result<Self, E>
    where
        T: Truthy + 'static,
        E: Into<Failure> + Send + 'static,
        C: Fn() -> Result<T, E> + Send + 'static,
        FT: FnMut(T) -> Result<U, E> + Send + 'static,
    {
        Self::build(condition, Box::new(on_true), None)
    }

    /// Like [`Show::with_fallback`], with a fallible condition and branches.
    pub fn try_with_fallback<T, E, C, FT, FF>(condition: C, on_true: FT, on_false: FF) -> Result<Self, E>
    where
        T: Truthy + 'static,
        E: Into<Failure> + Send + 'static,
        C: Fn() -> Result<T, E> + Send + 'static,
        FT: FnMut(T) -> Result<U, E> + Send + 'static,
        FF: FnMut() -> Result<U, E> + Send + 'static,
    {
        Self::build(condition, Box::new(on_true), Some(Box::new(on_false)))
    }

    fn build<T, E, C>(
        condition: C,
        mut on_true: TrueFn<T, U, E>,
        mut on_false: Option<FalseFn<U, E>>,
    ) -> Result<Self, E>
    where
        T: Truthy + 'static,
        E: Into<Failure> + Send + 'static,
        C: Fn() -> Result<T, E> + Send + 'static,
    {
        let container = Owner::new();
        let output: Signal<Option<U>> = Signal::with_equals(None, |_, _| false);
        let errors = FirstRunErrors::new();

        let computation = container.run(|| {
            let container = container.clone();
            let output = output.clone();
            let errors = errors.clone();
            let mut active = Active::Idle;

            Computation::new(move |_: Option<&()>| {
                let value = match condition() {
                    Ok(value) => value,
                    Err(error) => {
                        tracing::debug!(container = container.id(), "show: condition failed, keeping current branch");
                        errors.fail(error);
                        return;
                    }
                };

                if value.is_truthy() {
                    if matches!(active, Active::True(_)) {
                        return;
                    }
                    active.leave();
                    tracing::trace!(container = container.id(), "show: entering true branch");
                    let scope = container.child();
                    match scope.run(|| untrack(|| on_true(value))) {
                        Ok(result) => {
                            active = Active::True(scope);
                            output.set(Some(result));
                        }
                        Err(error) => {
                            scope.dispose();
                            output.set(None);
                            errors.fail(error);
                        }
                    }
                } else {
                    if matches!(active, Active::False(_)) {
                        return;
                    }
                    active.leave();
                    tracing::trace!(container = container.id(), "show: entering false branch");
                    match on_false.as_mut() {
                        Some(on_false) => {
                            let scope = container.child();
                            match scope.run(|| untrack(on_false)) {
                                Ok(result) => {
                                    active = Active::False(Some(scope));
                                    output.set(Some(result));
                                }
                                Err(error) => {
                                    scope.dispose();
                                    output.set(None);
                                    errors.fail(error);
                                }
                            }
                        }
                        None => {
                            active = Active::False(None);
                            output.set(None);
                        }
                    }
                }
            })
        });

        if let Some(error) = errors.finish() {
            container.dispose();
            return Err(error);
        }
        Ok(Self {
            container,
            output,
            computation,
        })
    }

    /// What the active branch returned, or `None` when no branch is built.
    ///
    /// Reading this inside a computation subscribes it to branch changes.
    pub fn value(&self) -> Option<U> {
        self.output.get()
    }

    /// The scope holding the condition computation and the branch scopes.
    pub fn owner(&self) -> Owner {
        self.container.clone()
    }

    /// Number of times the condition has been evaluated.
    pub fn run_count(&self) -> usize {
        self.computation.run_count()
    }

    /// Tear down the live branch and stop watching the condition.
    pub fn dispose(&self) {
        self.container.dispose();
    }
}

impl<U> fmt::Debug for Show<U>
where
    U: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Show")
            .field("owner", &self.container)
            .field("run_count", &self.run_count())
            .finish()
    }
}
