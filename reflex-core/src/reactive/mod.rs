//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computations
//! (effects and memos), ownership scopes and the global signal registry.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a running computation, the signal registers that computation as a
//! subscriber. When the value changes, every subscriber re-runs before the
//! write returns.
//!
//! ## Computations
//!
//! A Computation re-runs whenever a signal it read on its previous run
//! changes. Effects are computations run for their side effects; memos are
//! computations whose result other computations can depend on.
//!
//! ## Owners
//!
//! Every computation and cleanup callback belongs to an Owner. Disposing an
//! owner tears down its whole subtree, children first, and is the only way
//! to cancel reactive work.
//!
//! ## Failures
//!
//! A fallible computation that fails on a re-run reports the error to the
//! write that triggered it, through [`catch_failures`].
//!
//! # Implementation Notes
//!
//! Tracking and ownership both use thread-local stacks with RAII guards, so
//! dependencies are detected without threading a context parameter through
//! user code. Handles are `Send + Sync`, but a reactive graph is driven from
//! a single thread: all propagation is synchronous and depth-first.

mod context;
mod effect;
mod failure;
mod global;
mod memo;
mod owner;
mod runtime;
mod signal;
mod subscriber;

pub use context::{untrack, ReactiveContext};
pub use effect::{Computation, Effect};
pub use failure::{catch_failures, report_failure, Failure};
pub(crate) use failure::FirstRunErrors;
pub use global::{global, reset_globals, GlobalRegistry, RegistryError};
pub use memo::Memo;
pub use owner::{create_root, on_cleanup, with_owner, Owner};
pub use runtime::{Reactive, Runtime};
pub use signal::{ReadSignal, Signal};
pub use subscriber::{ComputationId, SignalId, Source};
