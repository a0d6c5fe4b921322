//! `For`: one scope per list item.
//!
//! # Reconciliation
//!
//! Every time the list changes, each new item is matched against the
//! previous entries by equality: first at its own position, then anywhere
//! else. Matched entries keep their scope untouched; if the item moved, only
//! its index signal is updated. Previous entries left unmatched are disposed
//! before any new item is constructed. Unmatched new items get a fresh scope
//! and the child function runs inside it, in list order.
//!
//! Duplicates are matched one-to-one, so `[a, a]` keeps two scopes.
//!
//! # Failures
//!
//! With [`For::try_new`] a failing list leaves every entry as it was, and a
//! failing child has its scope disposed and is left out of the output. The
//! item is built again on the next change. On the first run a failure
//! aborts construction instead.

use std::convert::Infallible;
use std::fmt;

use crate::reactive::{untrack, Computation, Failure, FirstRunErrors, Owner, ReadSignal, Signal};

struct Entry<T, U> {
    item: T,
    scope: Owner,
    index: Signal<usize>,
    output: U,
}

/// A reconciled set of per-item scopes driven by a reactive list.
///
/// # Example
///
/// ```rust
/// use reflex_core::flow::For;
/// use reflex_core::reactive::{create_root, Signal};
///
/// let names = Signal::new(vec!["a", "b"]);
/// let rows = create_root(|_| {
///     let names = names.clone();
///     For::new(move || names.get(), |name, index| format!("{}:{name}", index.get_untracked()))
/// });
///
/// assert_eq!(rows.values(), vec!["0:a", "1:b"]);
/// names.set(vec!["b", "a"]);
/// // Both scopes survive the reorder, so their outputs are unchanged.
/// assert_eq!(rows.values(), vec!["1:b", "0:a"]);
/// ```
pub struct For<U>
where
    U: Clone + Send + Sync + 'static,
{
    container: Owner,
    output: Signal<Vec<U>>,
    computation: Computation<()>,
}

impl<U> For<U>
where
    U: Clone + Send + Sync + 'static,
{
    /// Map every item of `list` through `child`, each in its own scope.
    ///
    /// `child` receives the item and a reactive accessor for its position.
    pub fn new<T, L, F>(list: L, mut child: F) -> Self
    where
        T: Clone + PartialEq + Send + 'static,
        L: Fn() -> Vec<T> + Send + 'static,
        F: FnMut(&T, ReadSignal<usize>) -> U + Send + 'static,
    {
        let built = Self::try_new::<T, Infallible, _, _>(
            move || Ok(list()),
            move |item, index| Ok(child(item, index)),
        );
        match built {
            Ok(rows) => rows,
            Err(never) => match never {},
        }
    }

    /// Like [`For::new`], with a fallible list and child.
    ///
    /// An error on the first run disposes every item built so far and is
    /// returned.
    pub fn try_new<T, E, L, F>(list: L, mut child: F) -> Result<Self, E>
    where
        T: Clone + PartialEq + Send + 'static,
        E: Into<Failure> + Send + 'static,
        L: Fn() -> Result<Vec<T>, E> + Send + 'static,
        F: FnMut(&T, ReadSignal<usize>) -> Result<U, E> + Send + 'static,
    {
        let container = Owner::new();
        let output: Signal<Vec<U>> = Signal::with_equals(Vec::new(), |_, _| false);
        let errors = FirstRunErrors::new();

        let computation = container.run(|| {
            let container = container.clone();
            let output = output.clone();
            let errors = errors.clone();
            let mut entries: Vec<Entry<T, U>> = Vec::new();

            Computation::new(move |_: Option<&()>| {
                let items = match list() {
                    Ok(items) => items,
                    Err(error) => {
                        tracing::debug!(container = container.id(), "for: list failed, keeping current items");
                        errors.fail(error);
                        return;
                    }
                };
                let mut previous: Vec<Option<Entry<T, U>>> =
                    std::mem::take(&mut entries).into_iter().map(Some).collect();

                // Same position first, so a stable prefix never moves.
                let mut matched: Vec<Option<Entry<T, U>>> = items
                    .iter()
                    .enumerate()
                    .map(|(pos, item)| match previous.get_mut(pos) {
                        Some(slot) if slot.as_ref().is_some_and(|e| e.item == *item) => slot.take(),
                        _ => None,
                    })
                    .collect();

                for (item, slot) in items.iter().zip(matched.iter_mut()) {
                    if slot.is_none() {
                        *slot = previous
                            .iter_mut()
                            .find(|p| p.as_ref().is_some_and(|e| e.item == *item))
                            .and_then(Option::take);
                    }
                }

                let removed: Vec<Entry<T, U>> = previous.into_iter().flatten().collect();
                if !removed.is_empty() {
                    tracing::trace!(container = container.id(), removed = removed.len(), "for: disposing removed items");
                }
                for entry in removed {
                    entry.scope.dispose();
                }

                for (pos, (item, slot)) in items.into_iter().zip(matched).enumerate() {
                    match slot {
                        Some(entry) => {
                            entry.index.set(pos);
                            entries.push(entry);
                        }
                        None => {
                            let scope = container.child();
                            let index = Signal::new(pos);
                            let read = index.read_only();
                            match scope.run(|| untrack(|| child(&item, read))) {
                                Ok(result) => entries.push(Entry {
                                    item,
                                    scope,
                                    index,
                                    output: result,
                                }),
                                Err(error) => {
                                    scope.dispose();
                                    errors.fail(error);
                                }
                            }
                        }
                    }
                }

                output.set(entries.iter().map(|e| e.output.clone()).collect());
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

    /// The mapped outputs, in list order.
    ///
    /// Reading this inside a computation subscribes it to list changes.
    pub fn values(&self) -> Vec<U> {
        self.output.get()
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.output.get_untracked().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The scope holding the list computation and every item scope.
    pub fn owner(&self) -> Owner {
        self.container.clone()
    }

    /// Number of times the list has been reconciled.
    pub fn run_count(&self) -> usize {
        self.computation.run_count()
    }

    /// Dispose every item scope and stop watching the list.
    pub fn dispose(&self) {
        self.container.dispose();
    }
}

impl<U> fmt::Debug for For<U>
where
    U: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("For")
            .field("owner", &self.container)
            .field("len", &self.len())
            .finish()
    }
}
