//! Reactive Runtime
//!
//! The runtime is the arena that connects signals to computations. Signals
//! only remember the ids of their subscribers; when a signal changes, the
//! runtime resolves those ids back to live computations and schedules them.
//!
//! # How It Works
//!
//! 1. When a computation is created, it registers with the runtime.
//!
//! 2. When a computation reads a signal, the signal records the
//!    computation's id.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Resolves every subscriber id to a live computation
//!    b. Releases its own lock
//!    c. Schedules each computation, in subscription order
//!
//! Scheduling is synchronous: the writer does not get control back until
//! every affected computation (and everything they in turn triggered) has
//! finished running.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use super::subscriber::ComputationId;

/// A trait for computations the runtime can schedule.
pub trait Reactive: Send + Sync {
    /// Get the id this computation subscribes with.
    fn subscriber_id(&self) -> ComputationId;

    /// Re-run the computation, or mark it pending if it is already running.
    fn schedule(&self);

    /// Stop the computation and drop its subscriptions.
    fn dispose(&self);

    /// Whether [`Reactive::dispose`] has been called.
    fn is_disposed(&self) -> bool;
}

/// The global reactive runtime.
pub struct Runtime;

// Maps subscriber ids to weak references so the arena never keeps a
// computation alive on its own.
static REGISTRY: OnceLock<RwLock<HashMap<ComputationId, Weak<dyn Reactive>>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<ComputationId, Weak<dyn Reactive>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

impl Runtime {
    /// Register a computation with the runtime.
    pub fn register(reactive: &Arc<dyn Reactive>) {
        let id = reactive.subscriber_id();
        registry().write().insert(id, Arc::downgrade(reactive));
    }

    /// Remove a computation from the arena.
    pub fn unregister(id: ComputationId) {
        registry().write().remove(&id);
    }

    /// Look up a live computation by id.
    pub fn resolve(id: ComputationId) -> Option<Arc<dyn Reactive>> {
        registry().read().get(&id).and_then(Weak::upgrade)
    }

    /// Schedule every subscriber in `subscribers`, in order.
    ///
    /// This is the core update propagation mechanism. Computations that
    /// were disposed by an earlier subscriber in the same pass are skipped.
    pub fn notify(subscribers: &[ComputationId]) {
        if subscribers.is_empty() {
            return;
        }

        let live: Vec<Arc<dyn Reactive>> = {
            let registry = registry().read();
            subscribers
                .iter()
                .filter_map(|id| registry.get(id).and_then(Weak::upgrade))
                .collect()
        };

        for reactive in live {
            if !reactive.is_disposed() {
                reactive.schedule();
            }
        }
    }

    /// Number of computations currently registered.
    pub fn live_count() -> usize {
        registry().read().len()
    }
}
