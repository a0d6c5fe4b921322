//! Reflex Core
//!
//! This crate provides a fine-grained reactive runtime and a rule
//! interpreter that builds reactive graphs from JSON documents.
//! It implements:
//!
//! - Reactive primitives (signals, effects, memos, ownership scopes)
//! - Control-flow combinators (`Show`, `For`)
//! - A process-wide registry of named signals
//! - A JsonLogic-compatible interpreter with reactive operators
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `reactive`: signals, computations, owners and the global registry
//! - `flow`: conditional and list combinators built on owners
//! - `rules`: document compilation and the tree-walking evaluator
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//!
//! use reflex_core::reactive::{create_root, Effect, Memo, Signal};
//!
//! let count = Signal::new(0);
//! let seen = Arc::new(AtomicI32::new(0));
//!
//! let root = create_root(|owner| {
//!     let doubled = {
//!         let count = count.clone();
//!         Memo::new(move |_| count.get() * 2)
//!     };
//!     let seen = seen.clone();
//!     Effect::new(move || seen.store(doubled.get(), Ordering::SeqCst));
//!     owner.clone()
//! });
//!
//! count.set(5);
//! assert_eq!(seen.load(Ordering::SeqCst), 10);
//!
//! root.dispose();
//! count.set(6);
//! assert_eq!(seen.load(Ordering::SeqCst), 10);
//! ```

pub mod flow;
pub mod reactive;
pub mod rules;

pub use flow::{For, Show};
pub use reactive::{Computation, Effect, Memo, Owner, Signal};
pub use rules::{run_logic, Context, Interpreter, Value};
