//! Ownership Scopes
//!
//! Every computation, combinator branch and cleanup callback belongs to
//! exactly one [`Owner`]. Owners form a tree: disposing an owner disposes its
//! children first (most recently created first), then stops the computation
//! it owns, then runs its own cleanups in reverse registration order, and
//! finally detaches it from its parent.
//!
//! The "current" owner is a thread-local stack managed with the same guard
//! pattern as the tracking context: [`Owner::run`] pushes on entry and the
//! guard pops on every exit path, including panics.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::runtime::Reactive;

type Cleanup = Box<dyn FnOnce() + Send>;

thread_local! {
    static OWNER_STACK: RefCell<Vec<Owner>> = const { RefCell::new(Vec::new()) };
}

struct OwnerNode {
    id: u64,
    parent: Mutex<Option<Weak<OwnerNode>>>,
    children: Mutex<Vec<Owner>>,
    cleanups: Mutex<Vec<Cleanup>>,
    /// The computation this scope belongs to, if any. Held strongly so a
    /// computation lives as long as its scope, not as long as its handle.
    reactive: Mutex<Option<Arc<dyn Reactive>>>,
    disposed: AtomicBool,
}

/// A node in the ownership tree.
///
/// Cloning an owner produces another handle to the same node.
#[derive(Clone)]
pub struct Owner {
    node: Arc<OwnerNode>,
}

impl Owner {
    fn with_parent(parent: Option<&Owner>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let owner = Self {
            node: Arc::new(OwnerNode {
                id: COUNTER.fetch_add(1, Ordering::Relaxed),
                parent: Mutex::new(parent.map(|p| Arc::downgrade(&p.node))),
                children: Mutex::new(Vec::new()),
                cleanups: Mutex::new(Vec::new()),
                reactive: Mutex::new(None),
                disposed: AtomicBool::new(false),
            }),
        };
        if let Some(parent) = parent {
            if parent.is_disposed() {
                tracing::warn!(parent = parent.id(), "scope created under a disposed owner");
            } else {
                parent.node.children.lock().push(owner.clone());
            }
        }
        owner
    }

    /// Create an owner with no parent.
    pub fn new_root() -> Self {
        Self::with_parent(None)
    }

    /// Create a child of the current owner, or a root if there is none.
    pub fn new() -> Self {
        match Self::current() {
            Some(current) => current.child(),
            None => Self::new_root(),
        }
    }

    /// Create a child of this owner.
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self))
    }

    /// The innermost owner on this thread, if any.
    pub fn current() -> Option<Owner> {
        OWNER_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Run `f` with this owner as the current one.
    ///
    /// The previous owner is restored when `f` returns or unwinds.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = OwnerGuard::push(self.clone());
        f()
    }

    /// Unique id, for diagnostics.
    pub fn id(&self) -> u64 {
        self.node.id
    }

    /// Append a cleanup callback to this owner.
    pub fn on_cleanup(&self, f: impl FnOnce() + Send + 'static) {
        if self.is_disposed() {
            tracing::warn!(owner = self.id(), "cleanup registered on a disposed owner is dropped");
            return;
        }
        self.node.cleanups.lock().push(Box::new(f));
    }

    pub(crate) fn adopt(&self, reactive: Arc<dyn Reactive>) {
        *self.node.reactive.lock() = Some(reactive);
    }

    /// Dispose children and run cleanups, leaving the owner itself live.
    ///
    /// Computations call this before every re-run so that whatever their
    /// previous run created is torn down first.
    pub(crate) fn reset(&self) {
        let children = std::mem::take(&mut *self.node.children.lock());
        for child in children.into_iter().rev() {
            child.dispose();
        }

        let cleanups = std::mem::take(&mut *self.node.cleanups.lock());
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
    }

    /// Dispose this owner and everything below it.
    ///
    /// Disposing an owner twice is a no-op.
    pub fn dispose(&self) {
        if self.node.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(owner = self.id(), "disposing scope");

        let children = std::mem::take(&mut *self.node.children.lock());
        for child in children.into_iter().rev() {
            child.dispose();
        }

        let reactive = self.node.reactive.lock().take();
        if let Some(reactive) = reactive {
            reactive.dispose();
        }

        let cleanups = std::mem::take(&mut *self.node.cleanups.lock());
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }

        let parent = self.node.parent.lock().take();
        if let Some(parent) = parent.and_then(|p| p.upgrade()) {
            parent
                .children
                .lock()
                .retain(|child| !Arc::ptr_eq(&child.node, &self.node));
        }
    }

    /// Whether [`Owner::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.node.disposed.load(Ordering::SeqCst)
    }

    /// Number of live child scopes.
    pub fn child_count(&self) -> usize {
        self.node.children.lock().len()
    }

    /// Number of cleanups waiting to run.
    pub fn cleanup_count(&self) -> usize {
        self.node.cleanups.lock().len()
    }

    /// The parent owner, if it is still alive.
    pub fn parent(&self) -> Option<Owner> {
        self.node
            .parent
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|node| Owner { node })
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.node.id)
            .field("children", &self.child_count())
            .field("cleanups", &self.cleanup_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Pops the owner stack when dropped.
struct OwnerGuard {
    owner: u64,
}

impl OwnerGuard {
    fn push(owner: Owner) -> Self {
        let id = owner.id();
        OWNER_STACK.with(|stack| stack.borrow_mut().push(owner));
        Self { owner: id }
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        OWNER_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped.map(|o| o.id()), Some(self.owner), "owner stack mismatch");
        });
    }
}

/// Register a cleanup with the current owner.
///
/// Outside of any owner there is nothing to attach to, so the callback is
/// dropped and a warning is traced.
pub fn on_cleanup(f: impl FnOnce() + Send + 'static) {
    match Owner::current() {
        Some(owner) => owner.on_cleanup(f),
        None => tracing::warn!("on_cleanup called outside of an owner; callback will never run"),
    }
}

/// Create a child of `parent` and run `body` with it as the current owner.
pub fn with_owner<R>(parent: &Owner, body: impl FnOnce() -> R) -> (Owner, R) {
    let child = parent.child();
    let result = child.run(body);
    (child, result)
}

/// Run `f` inside a fresh root owner.
///
/// The root is handed to `f`; dispose it to tear everything down.
pub fn create_root<R>(f: impl FnOnce(&Owner) -> R) -> R {
    let root = Owner::new_root();
    root.run(|| f(&root))
}
