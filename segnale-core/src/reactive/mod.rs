//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives form the foundation of Segnale's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a running computation (a memo or an effect), the signal registers
//! that computation as a dependent. When the value changes, all dependents
//! are marked dirty and scheduled.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It is computed on first
//! access and re-evaluated only after one of the signals it read changed.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects synchronize reactive state with the outside
//! world. Async effects return a future whose reads are tracked across
//! `.await` points.
//!
//! ## Signal Trees
//!
//! A structured value can be decomposed into one signal per field, so that
//! writes to one field only wake up readers of that field.
//!
//! # Implementation Notes
//!
//! All state lives in an explicit [`Runtime`]: the dependency graph, the
//! context stack used to attribute reads, the dirty set and microtask queue
//! of the scheduler, and the async task pool. There are no globals, so any
//! number of runtimes can coexist on one thread.

mod config;
mod context;
mod effect;
mod memo;
mod runtime;
mod scheduler;
mod signal;
mod subscriber;
mod tasks;
mod tree;

pub use config::{BatchUpdates, ErrorHook, RuntimeBuilder, RuntimeConfig, DEFAULT_LABEL};
pub use context::Tracked;
pub use memo::Memo;
pub use runtime::Runtime;
pub(crate) use runtime::RuntimeInner;
pub use signal::Signal;
pub use subscriber::Unsubscribe;
pub use tree::SignalTree;
